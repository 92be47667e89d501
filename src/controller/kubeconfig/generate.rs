//! # Kubeconfig Derivation
//!
//! Pure transform from service account credentials to a kubeconfig
//! document. Nothing here touches the store.

use crate::constants::SERVICE_ACCOUNT_NAME;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Reasons a kubeconfig cannot be derived
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerateError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("token is not valid base64 encoded UTF-8")]
    InvalidToken,
}

/// Inputs of [`generate_kubeconfig`]
#[derive(Clone, Copy)]
pub struct KubeconfigOptions<'a> {
    /// Base64 encoded bearer token, as stored in the token secret
    pub token: &'a [u8],
    /// CA bundle, carried into the document verbatim
    pub ca_cert: &'a [u8],
    pub api_server_endpoint: &'a str,
    pub cluster_name: &'a str,
    /// Default namespace of the generated context
    pub namespace: &'a str,
}

impl fmt::Debug for KubeconfigOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeconfigOptions")
            .field("token", &"<redacted>")
            .field("ca_cert_len", &self.ca_cert.len())
            .field("api_server_endpoint", &self.api_server_endpoint)
            .field("cluster_name", &self.cluster_name)
            .field("namespace", &self.namespace)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeconfigCluster {
    pub server: String,
    pub certificate_authority_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeconfigContext {
    pub cluster: String,
    pub auth_info: String,
    pub namespace: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct KubeconfigAuthInfo {
    pub token: Zeroizing<String>,
}

impl fmt::Debug for KubeconfigAuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeconfigAuthInfo")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A kubeconfig with one cluster, one context and one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeconfigDocument {
    pub clusters: BTreeMap<String, KubeconfigCluster>,
    pub contexts: BTreeMap<String, KubeconfigContext>,
    pub auth_infos: BTreeMap<String, KubeconfigAuthInfo>,
    pub current_context: String,
}

// Wire form, as written by kubectl
#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct Config<'a> {
    api_version: &'static str,
    clusters: Vec<Named<'a, ClusterWire<'a>>>,
    contexts: Vec<Named<'a, ContextWire<'a>>>,
    current_context: &'a str,
    kind: &'static str,
    preferences: BTreeMap<String, String>,
    users: Vec<NamedUser<'a>>,
}

#[derive(Serialize)]
struct Named<'a, T> {
    #[serde(flatten)]
    inner: T,
    name: &'a str,
}

#[derive(Serialize)]
struct ClusterWire<'a> {
    cluster: ClusterFields<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterFields<'a> {
    certificate_authority_data: String,
    server: &'a str,
}

#[derive(Serialize)]
struct ContextWire<'a> {
    context: ContextFields<'a>,
}

#[derive(Serialize)]
struct ContextFields<'a> {
    cluster: &'a str,
    namespace: &'a str,
    user: &'a str,
}

#[derive(Serialize)]
struct NamedUser<'a> {
    name: &'a str,
    user: UserFields<'a>,
}

#[derive(Serialize)]
struct UserFields<'a> {
    token: &'a str,
}

impl KubeconfigDocument {
    /// Serialize to kubeconfig YAML. Identical documents give identical bytes.
    pub fn to_yaml(&self) -> Result<Zeroizing<Vec<u8>>, serde_yaml::Error> {
        let config = Config {
            api_version: "v1",
            clusters: self
                .clusters
                .iter()
                .map(|(name, cluster)| Named {
                    inner: ClusterWire {
                        cluster: ClusterFields {
                            certificate_authority_data: STANDARD
                                .encode(&cluster.certificate_authority_data),
                            server: &cluster.server,
                        },
                    },
                    name,
                })
                .collect(),
            contexts: self
                .contexts
                .iter()
                .map(|(name, context)| Named {
                    inner: ContextWire {
                        context: ContextFields {
                            cluster: &context.cluster,
                            namespace: &context.namespace,
                            user: &context.auth_info,
                        },
                    },
                    name,
                })
                .collect(),
            current_context: &self.current_context,
            kind: "Config",
            preferences: BTreeMap::new(),
            users: self
                .auth_infos
                .iter()
                .map(|(name, auth)| NamedUser {
                    name,
                    user: UserFields { token: &auth.token },
                })
                .collect(),
        };
        Ok(Zeroizing::new(serde_yaml::to_string(&config)?.into_bytes()))
    }
}

fn require<'a>(value: &'a [u8], field: &'static str) -> Result<&'a [u8], GenerateError> {
    if value.is_empty() {
        return Err(GenerateError::EmptyField(field));
    }
    Ok(value)
}

fn decode_token(token: &[u8]) -> Result<Zeroizing<String>, GenerateError> {
    let Ok(decoded) = STANDARD.decode(token.trim_ascii()) else {
        return Err(GenerateError::InvalidToken);
    };
    let token = match String::from_utf8(decoded) {
        Ok(token) => token,
        Err(e) => {
            e.into_bytes().zeroize();
            return Err(GenerateError::InvalidToken);
        }
    };
    if token.is_empty() {
        return Err(GenerateError::EmptyField("token"));
    }
    Ok(Zeroizing::new(token))
}

/// Build a kubeconfig that authenticates as the operator's service account
pub fn generate_kubeconfig(
    options: KubeconfigOptions<'_>,
) -> Result<KubeconfigDocument, GenerateError> {
    let token = require(options.token, "token")?;
    let ca_cert = require(options.ca_cert, "ca_cert")?;
    require(options.api_server_endpoint.as_bytes(), "api_server_endpoint")?;
    require(options.cluster_name.as_bytes(), "cluster_name")?;
    require(options.namespace.as_bytes(), "namespace")?;

    let token = decode_token(token)?;
    let cluster_name = options.cluster_name.to_string();

    let clusters = BTreeMap::from([(
        cluster_name.clone(),
        KubeconfigCluster {
            server: options.api_server_endpoint.to_string(),
            certificate_authority_data: ca_cert.to_vec(),
        },
    )]);
    let contexts = BTreeMap::from([(
        cluster_name.clone(),
        KubeconfigContext {
            cluster: cluster_name.clone(),
            auth_info: SERVICE_ACCOUNT_NAME.to_string(),
            namespace: options.namespace.to_string(),
        },
    )]);
    let auth_infos = BTreeMap::from([(
        SERVICE_ACCOUNT_NAME.to_string(),
        KubeconfigAuthInfo { token },
    )]);

    Ok(KubeconfigDocument {
        clusters,
        contexts,
        auth_infos,
        current_context: cluster_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> KubeconfigOptions<'static> {
        KubeconfigOptions {
            token: b"dGVzdA==",
            ca_cert: b"dGVzdA==",
            api_server_endpoint: "https://example.com",
            cluster_name: "test",
            namespace: "openshift-cluster-api",
        }
    }

    #[test]
    fn test_generate_kubeconfig() {
        let opts = options();
        let kubeconfig = generate_kubeconfig(opts).unwrap();

        let cluster = &kubeconfig.clusters["test"];
        assert_eq!(cluster.server, "https://example.com");
        assert_eq!(cluster.certificate_authority_data, b"dGVzdA==");

        let context = &kubeconfig.contexts["test"];
        assert_eq!(context.cluster, "test");
        assert_eq!(context.auth_info, "cluster-capi-operator");
        assert_eq!(context.namespace, "openshift-cluster-api");

        assert_eq!(
            kubeconfig.auth_infos["cluster-capi-operator"].token.as_str(),
            "test"
        );
        assert_eq!(kubeconfig.current_context, "test");
    }

    #[test]
    fn test_empty_fields_fail() {
        let cases: [(&str, KubeconfigOptions<'static>); 4] = [
            ("token", KubeconfigOptions { token: b"", ..options() }),
            ("ca_cert", KubeconfigOptions { ca_cert: b"", ..options() }),
            (
                "api_server_endpoint",
                KubeconfigOptions {
                    api_server_endpoint: "",
                    ..options()
                },
            ),
            (
                "cluster_name",
                KubeconfigOptions {
                    cluster_name: "",
                    ..options()
                },
            ),
        ];
        for (field, opts) in cases {
            assert_eq!(
                generate_kubeconfig(opts).unwrap_err(),
                GenerateError::EmptyField(field)
            );
        }
    }

    #[test]
    fn test_invalid_token() {
        let opts = KubeconfigOptions {
            token: b"not base64!",
            ..options()
        };
        assert_eq!(generate_kubeconfig(opts).unwrap_err(), GenerateError::InvalidToken);
    }

    #[test]
    fn test_yaml_is_deterministic() {
        let first = generate_kubeconfig(options()).unwrap().to_yaml().unwrap();
        let second = generate_kubeconfig(options()).unwrap().to_yaml().unwrap();
        assert_eq!(*first, *second);

        let yaml: serde_yaml::Value = serde_yaml::from_slice(&first).unwrap();
        assert_eq!(yaml["kind"], "Config");
        assert_eq!(yaml["current-context"], "test");
        assert_eq!(yaml["clusters"][0]["cluster"]["server"], "https://example.com");
        assert_eq!(
            yaml["clusters"][0]["cluster"]["certificate-authority-data"],
            "ZEdWemRBPT0="
        );
        assert_eq!(yaml["users"][0]["user"]["token"], "test");
    }

    #[test]
    fn test_debug_redacts_token() {
        let kubeconfig = generate_kubeconfig(options()).unwrap();
        let debug = format!("{kubeconfig:?}");
        assert!(!debug.contains("token: \"test\""));
        assert!(debug.contains("<redacted>"));
    }
}
