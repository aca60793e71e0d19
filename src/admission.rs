//! Admission of deployments.
//!
//! The admission controller is the caller of the validator. For every
//! container of a deployment, it fetches the image manifest and its
//! signature bundle through an [`ImageSource`], validates the signature,
//! and produces a JSON patch that pins the container image to the digest
//! of the verified manifest. Any failure denies the whole deployment.

use std::collections::HashMap;
use std::fmt;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use crate::crypto::digest_of;
use crate::error::{ErrorKind, Stage, ValidationError};
use crate::util::base64;
use crate::validator::Validator;


//------------ ImageRef ------------------------------------------------------

/// A reference to a container image.
///
/// The reference is split on the first slash into the registry host and
/// the path. The path is split on `@` into repository and digest or,
/// failing that, on `:` into repository and tag. The tag defaults to
/// `latest`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageRef {
    pub host: String,
    pub repository: String,

    /// The tag or digest reference.
    pub reference: String,
}

impl ImageRef {
    pub fn parse(image: &str) -> Self {
        let (host, path) = image.split_once('/').unwrap_or((image, ""));
        let (repository, reference) = match path.split_once('@') {
            Some((repository, digest)) => (repository, digest),
            None => path.split_once(':').unwrap_or((path, "latest")),
        };
        ImageRef {
            host: host.into(),
            repository: repository.into(),
            reference: reference.into(),
        }
    }

    /// Returns the image reference pinned to a manifest digest.
    pub fn pinned(&self, digest_hex: &str) -> String {
        format!("{}/{}@sha256:{}", self.host, self.repository, digest_hex)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}:{}", self.host, self.repository, self.reference)
    }
}


//------------ ImageSource ---------------------------------------------------

/// Where manifests and signature bundles come from.
///
/// In production, manifests come from a container registry and signature
/// bundles from object storage.
pub trait ImageSource {
    /// Returns the manifest for a repository and tag.
    ///
    /// If there isn’t exactly one manifest, the error must be of kind
    /// `ManifestLookupFailed`.
    fn get_manifest(
        &self, repository: &str, tag: &str
    ) -> Result<Vec<u8>, ValidationError>;

    /// Returns the signature bundle for a manifest.
    ///
    /// The digest is the prefixed digest of the manifest as returned by
    /// [`digest_of`]. A missing bundle must be reported as an error of kind
    /// `SignatureNotFound`.
    fn get_manifest_signature(
        &self, repository: &str, digest: &str
    ) -> Result<Vec<u8>, ValidationError>;
}

impl<T: ImageSource + ?Sized> ImageSource for &T {
    fn get_manifest(
        &self, repository: &str, tag: &str
    ) -> Result<Vec<u8>, ValidationError> {
        (*self).get_manifest(repository, tag)
    }

    fn get_manifest_signature(
        &self, repository: &str, digest: &str
    ) -> Result<Vec<u8>, ValidationError> {
        (*self).get_manifest_signature(repository, digest)
    }
}

/// Returns the object storage key of a manifest’s signature bundle.
pub fn signature_key(repository: &str, digest: &str) -> String {
    format!("{}/{}/manifest.json.sig", repository, digest)
}


//------------ InMemoryImageSource -------------------------------------------

/// An image source keeping everything in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryImageSource {
    /// The manifests by repository and tag.
    manifests: HashMap<(String, String), Vec<Vec<u8>>>,

    /// The signature bundles by storage key.
    objects: HashMap<String, Vec<u8>>,
}

impl InMemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a manifest for a repository and tag.
    ///
    /// Adding a second manifest for the same tag makes lookups fail.
    pub fn add_manifest(
        &mut self, repository: &str, tag: &str, manifest: Vec<u8>
    ) {
        self.manifests.entry(
            (repository.into(), tag.into())
        ).or_default().push(manifest)
    }

    /// Adds the signature bundle for a manifest.
    pub fn add_signature(
        &mut self, repository: &str, manifest: &[u8], bundle: Vec<u8>
    ) {
        self.objects.insert(
            signature_key(repository, &digest_of(manifest)), bundle
        );
    }
}

impl ImageSource for InMemoryImageSource {
    fn get_manifest(
        &self, repository: &str, tag: &str
    ) -> Result<Vec<u8>, ValidationError> {
        let manifests = self.manifests.get(
            &(repository.into(), tag.into())
        ).map(Vec::as_slice).unwrap_or_default();
        match manifests {
            [manifest] => Ok(manifest.clone()),
            _ => {
                Err(ValidationError::new(
                    ErrorKind::ManifestLookupFailed, Stage::FetchManifest
                ))
            }
        }
    }

    fn get_manifest_signature(
        &self, repository: &str, digest: &str
    ) -> Result<Vec<u8>, ValidationError> {
        self.objects.get(&signature_key(repository, digest)).cloned()
            .ok_or_else(|| {
                ValidationError::new(
                    ErrorKind::SignatureNotFound, Stage::FetchSignature
                )
            })
    }
}


//------------ Deployment ----------------------------------------------------

/// The parts of a deployment object we need.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct Deployment {
    spec: DeploymentSpec,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct DeploymentSpec {
    template: PodTemplate,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct PodTemplate {
    spec: PodSpec,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct PodSpec {
    containers: Vec<Container>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct Container {
    name: String,
    image: String,
}


//------------ PatchOperation ------------------------------------------------

/// A single JSON patch operation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PatchOperation {
    pub op: String,
    pub path: String,
    pub value: String,
}

impl PatchOperation {
    /// Creates the operation replacing the image of a container.
    fn replace_image(index: usize, image: String) -> Self {
        PatchOperation {
            op: "replace".into(),
            path: format!("/spec/template/spec/containers/{}/image", index),
            value: image,
        }
    }
}


//------------ Decision ------------------------------------------------------

/// Whether a request is admitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    Allowed,
    Denied,
}


//------------ PatchType -----------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PatchType {
    JsonPatch,
}

impl PatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            PatchType::JsonPatch => "JSONPatch",
        }
    }
}


//------------ AdmissionResponse ---------------------------------------------

/// The outcome of an admission request.
///
/// Responses can only be created as either allowed with a patch or denied
/// with a message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AdmissionResponse {
    decision: Decision,
    message: Option<String>,
    patch: Option<Vec<u8>>,
    patch_type: Option<PatchType>,
}

impl AdmissionResponse {
    pub fn allowed(patch: Vec<u8>) -> Self {
        AdmissionResponse {
            decision: Decision::Allowed,
            message: None,
            patch: Some(patch),
            patch_type: Some(PatchType::JsonPatch),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        AdmissionResponse {
            decision: Decision::Denied,
            message: Some(message.into()),
            patch: None,
            patch_type: None,
        }
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allowed
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the JSON patch of an allowed response.
    pub fn patch(&self) -> Option<&[u8]> {
        self.patch.as_deref()
    }

    pub fn patch_type(&self) -> Option<PatchType> {
        self.patch_type
    }

    /// Returns the response as a Kubernetes `AdmissionResponse` object.
    pub fn to_json(&self, uid: &str) -> serde_json::Value {
        let mut res = serde_json::json!({
            "uid": uid,
            "allowed": self.is_allowed(),
        });
        if let Some(ref message) = self.message {
            res["status"] = serde_json::json!({ "message": message });
        }
        if let Some(ref patch) = self.patch {
            res["patch"] = base64::Serde.encode(patch).into();
        }
        if let Some(patch_type) = self.patch_type {
            res["patchType"] = patch_type.as_str().into();
        }
        res
    }
}


//------------ AdmissionController -------------------------------------------

/// The admission controller.
#[derive(Clone, Debug)]
pub struct AdmissionController<S> {
    source: S,
    validator: Validator,
}

impl<S: ImageSource> AdmissionController<S> {
    pub fn new(source: S) -> Self {
        Self::with_validator(source, Validator::default())
    }

    pub fn with_validator(source: S, validator: Validator) -> Self {
        AdmissionController { source, validator }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Processes the raw deployment object of an admission request.
    pub fn mutate(&self, object: &[u8]) -> AdmissionResponse {
        let deployment: Deployment = match serde_json::from_slice(object) {
            Ok(deployment) => deployment,
            Err(err) => {
                warn!("could not decode admission request object: {}", err);
                return AdmissionResponse::denied(
                    "could not decode admission request object"
                )
            }
        };

        let mut patch = Vec::new();
        let containers = deployment.spec.template.spec.containers;
        for (index, container) in containers.iter().enumerate() {
            match self.pin_image(&container.image) {
                Ok(image) => {
                    info!(
                        "container {:?}: pinned {} to {}",
                        container.name, container.image, image
                    );
                    patch.push(PatchOperation::replace_image(index, image))
                }
                Err(response) => return response
            }
        }

        match serde_json::to_vec(&patch) {
            Ok(patch) => {
                info!(
                    "admitted deployment with patch {}",
                    String::from_utf8_lossy(&patch)
                );
                AdmissionResponse::allowed(patch)
            }
            Err(err) => AdmissionResponse::denied(err.to_string()),
        }
    }

    /// Verifies the image of a container and returns the pinned image.
    fn pin_image(&self, image: &str) -> Result<String, AdmissionResponse> {
        let image = ImageRef::parse(image);
        let repo = image.repository.as_str();
        let tag = image.reference.as_str();
        let deny = |what: &str, err: &ValidationError| {
            warn!(
                "{}, repo={:?}, tag={:?}: {}", what, repo, tag, err
            );
            AdmissionResponse::denied(format!(
                "{}, stage={}, repo={:?}, tag={:?}",
                what, err.stage(), repo, tag
            ))
        };

        let manifest = self.source.get_manifest(repo, tag).map_err(|err| {
            deny("failed to fetch manifest", &err)
        })?;
        let digest = digest_of(&manifest);
        let bundle = self.source.get_manifest_signature(
            repo, &digest
        ).map_err(|err| {
            deny("failed to fetch manifest signature", &err)
        })?;
        if bundle.is_empty() {
            return Err(deny(
                "failed to fetch manifest signature",
                &ValidationError::new(
                    ErrorKind::SignatureNotFound, Stage::FetchSignature
                )
            ))
        }
        let (digest_hex, _) = self.validator.validate(
            &manifest, &bundle
        ).map_err(|err| {
            deny("failed to validate manifest signature", &err)
        })?;
        Ok(image.pinned(&digest_hex))
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_image() {
        assert_eq!(
            ImageRef::parse("registry.example.com/team/app:v1"),
            ImageRef {
                host: "registry.example.com".into(),
                repository: "team/app".into(),
                reference: "v1".into(),
            }
        );
        assert_eq!(
            ImageRef::parse("localhost:5000/app@sha256:abcd").reference,
            "sha256:abcd"
        );
        assert_eq!(
            ImageRef::parse("localhost:5000/app").reference, "latest"
        );
        let bare = ImageRef::parse("nginx");
        assert_eq!(bare.host, "nginx");
        assert_eq!(bare.repository, "");
        assert_eq!(bare.reference, "latest");
        assert_eq!(
            ImageRef::parse("host/app:v1").pinned("00ff"),
            "host/app@sha256:00ff"
        );
    }

    #[test]
    fn in_memory_source() {
        let mut source = InMemoryImageSource::new();
        source.add_manifest("app", "v1", b"one".to_vec());
        source.add_manifest("app", "v2", b"two".to_vec());
        source.add_manifest("app", "v2", b"three".to_vec());
        source.add_signature("app", b"one", b"{}".to_vec());

        assert_eq!(source.get_manifest("app", "v1").unwrap(), b"one");
        for tag in ["v2", "v3"] {
            assert_eq!(
                source.get_manifest("app", tag).unwrap_err().kind(),
                ErrorKind::ManifestLookupFailed
            );
        }
        assert_eq!(
            source.get_manifest_signature("app", &digest_of(b"one")).unwrap(),
            b"{}"
        );
        assert_eq!(
            source.get_manifest_signature(
                "app", &digest_of(b"two")
            ).unwrap_err().kind(),
            ErrorKind::SignatureNotFound
        );
        assert_eq!(
            signature_key("team/app", "sha256:00"),
            "team/app/sha256:00/manifest.json.sig"
        );
    }

    #[test]
    fn undecodable_object() {
        let controller = AdmissionController::new(InMemoryImageSource::new());
        let response = controller.mutate(b"not a deployment");
        assert_eq!(response.decision(), Decision::Denied);
        assert!(response.patch().is_none());
        assert_eq!(
            response.to_json("1"),
            serde_json::json!({
                "uid": "1",
                "allowed": false,
                "status": {
                    "message": "could not decode admission request object"
                }
            })
        );
    }

    #[test]
    fn allowed_response_json() {
        let response = AdmissionResponse::allowed(b"[]".to_vec());
        assert_eq!(
            response.to_json("2"),
            serde_json::json!({
                "uid": "2",
                "allowed": true,
                "patch": "W10=",
                "patchType": "JSONPatch"
            })
        );
    }
}
