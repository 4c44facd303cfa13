//! Runtime configuration, built through a validating builder in the style of
//! the consensus layer's own `Config`.

/// Knobs governing a session core deployment. Immutable once built.
#[derive(Clone, Debug)]
pub struct Config {
    /// Name of the cluster this session core is attached to. Carried into every
    /// `#[instrument]` span so logs from many clusters interleave legibly.
    pub cluster_name: String,
    /// Session timeout requested at `openSession` time, and re-armed by every
    /// successful keep-alive (spec §4.6, "timestamp").
    pub session_timeout_millis: u64,
}

impl Config {
    /// Start building a `Config` for the named cluster.
    pub fn build(cluster_name: String) -> ConfigBuilder {
        ConfigBuilder {
            cluster_name,
            session_timeout_millis: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    cluster_name: String,
    session_timeout_millis: Option<u64>,
}

impl ConfigBuilder {
    pub fn session_timeout_millis(mut self, millis: u64) -> Self {
        self.session_timeout_millis = Some(millis);
        self
    }

    /// Validate and freeze the builder into a `Config`.
    pub fn validate(self) -> anyhow::Result<Config> {
        if self.cluster_name.is_empty() {
            anyhow::bail!("cluster_name must not be empty");
        }
        let session_timeout_millis = self.session_timeout_millis.unwrap_or(10_000);
        if session_timeout_millis == 0 {
            anyhow::bail!("session_timeout_millis must be greater than zero");
        }
        Ok(Config {
            cluster_name: self.cluster_name,
            session_timeout_millis,
        })
    }
}
