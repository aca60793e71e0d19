//! Verifies the signature of an image manifest offline.

use std::{fs, process};
use std::path::{Path, PathBuf};
use clap::Parser;
use manifest_sig::chain::{CertPool, ReferenceTime};
use manifest_sig::config::ConfigArgs;
use manifest_sig::validator::Validator;
use manifest_sig::x509::Time;


#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// The image manifest
    manifest: PathBuf,

    /// The signature bundle of the manifest’s repository
    bundle: PathBuf,

    /// Verify certificates at this time instead of now (RFC 3339)
    #[arg(long, value_name = "TIME")]
    at: Option<Time>,

    /// Skip certificate validity checks
    #[arg(long, conflicts_with = "at")]
    ignore_time: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

fn read(path: &Path) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|err| format!("{}: {}", path.display(), err))
}

fn run(args: Args) -> Result<(), String> {
    let config = args.config.into_config().map_err(|err| err.to_string())?;
    env_logger::Builder::new()
        .filter_level(config.log_filter().map_err(|err| err.to_string())?)
        .init();

    let mut validator = Validator::new();
    if let Some(path) = config.trust_anchors.as_ref() {
        let anchors = CertPool::from_pem(&read(path)?).map_err(|err| {
            format!("{}: {}", path.display(), err)
        })?;
        validator = validator.with_trust_anchors(anchors);
    }
    if let Some(time) = args.at {
        validator = validator.with_time(ReferenceTime::At(time));
    }
    else if args.ignore_time {
        validator = validator.with_time(ReferenceTime::Unchecked);
    }

    let manifest = read(&args.manifest)?;
    let bundle = read(&args.bundle)?;
    let (digest_hex, _) = validator.validate(
        &manifest, &bundle
    ).map_err(|err| err.to_string())?;
    println!("sha256:{}", digest_hex);
    Ok(())
}

fn main() {
    if let Err(err) = run(Args::parse()) {
        eprintln!("verification failed: {}", err);
        process::exit(1)
    }
}
