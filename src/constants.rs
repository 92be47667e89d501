//! # Constants
//!
//! Well-known object identities, label keys and defaults shared by the
//! reconcile loops, the runtime and the configuration layer.

/// Name of the `ClusterOperator` this operator reports its health on
pub const CLUSTER_OPERATOR_NAME: &str = "cluster-api";

/// Singleton name of the `Infrastructure` record
pub const INFRASTRUCTURE_RESOURCE_NAME: &str = "cluster";

/// Singleton name of the `FeatureGate` record
pub const FEATURE_GATE_NAME: &str = "cluster";

/// Namespace holding the Cluster API components and the generated kubeconfig
pub const DEFAULT_MANAGED_NAMESPACE: &str = "openshift-cluster-api";

/// Namespace the operator itself runs in
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "openshift-cluster-api";

/// Service account whose token is embedded into the generated kubeconfig.
/// Also used as the auth info name inside the kubeconfig.
pub const SERVICE_ACCOUNT_NAME: &str = "cluster-capi-operator";

/// Data key of the bearer token in a service account token secret
pub const TOKEN_SECRET_TOKEN_KEY: &str = "token";

/// Data key of the CA bundle in a service account token secret
pub const TOKEN_SECRET_CA_KEY: &str = "ca.crt";

/// Data key the serialized kubeconfig is stored under
pub const KUBECONFIG_SECRET_DATA_KEY: &str = "value";

/// Suffix appended to the cluster name to build the kubeconfig secret name
pub const KUBECONFIG_SECRET_SUFFIX: &str = "kubeconfig";

/// Label binding a secret to a Cluster API cluster
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Secret type Cluster API expects for cluster secrets
pub const CLUSTER_SECRET_TYPE: &str = "cluster.x-k8s.io/secret";

/// Version entry name reported on the `ClusterOperator`
pub const OPERATOR_VERSION_NAME: &str = "operator";

/// Default release version when `RELEASE_VERSION` is not set
pub const DEFAULT_RELEASE_VERSION: &str = "0.0.1-snapshot";

/// Platforms the kubeconfig loop acts on by default (lowercase)
pub const DEFAULT_SUPPORTED_PLATFORMS: &[&str] = &["aws", "azure", "gcp", "openstack"];

/// Feature sets that enable Cluster API by default
pub const DEFAULT_ENABLED_FEATURE_SETS: &[&str] = &["TechPreviewNoUpgrade", "CustomNoUpgrade"];

/// Default number of read-modify-write cycles for status writes
pub const DEFAULT_STATUS_MAX_ATTEMPTS: u32 = 5;

/// Default number of get/create/replace cycles for the kubeconfig upsert
pub const DEFAULT_UPSERT_MAX_ATTEMPTS: u32 = 5;

/// Base pause between conflicting status writes (milliseconds)
pub const DEFAULT_CONFLICT_RETRY_BASE_MS: u64 = 50;

/// Default periodic resync interval (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 600;

/// Default minimum reconcile error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;

/// Default maximum reconcile error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default HTTP port for metrics and probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Field manager / component name used in logs and events
pub const FIELD_MANAGER: &str = "cluster-capi-operator";
