use matroska::walker::DEFAULT_MAX_ELEMENT_SIZE;

/// Tunables of an extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct ExtractConfig {
    /// Frame duration assumed for AVC tracks without a default duration, in milliseconds
    #[cfg_attr(
        feature = "clap",
        arg(long, env = "MKX_AVC_DEFAULT_DURATION_MS", default_value_t = 40)
    )]
    pub avc_default_duration_ms: u64,

    /// Keep AVC frames that precede the first IDR frame
    #[cfg_attr(feature = "clap", arg(long, env = "MKX_KEEP_LEADING_NON_KEY"))]
    pub keep_leading_non_key: bool,

    /// Frames buffered while an IVF header waits for a sequence header
    #[cfg_attr(
        feature = "clap",
        arg(long, env = "MKX_IVF_MAX_DEFERRED_FRAMES", default_value_t = 64)
    )]
    pub ivf_max_deferred_frames: usize,

    /// Log progress every N clusters, 0 disables progress lines
    #[cfg_attr(
        feature = "clap",
        arg(long, env = "MKX_PROGRESS_INTERVAL", default_value_t = 500)
    )]
    pub progress_interval: u64,

    /// Largest element read into memory, in bytes
    #[cfg_attr(
        feature = "clap",
        arg(long, env = "MKX_MAX_ELEMENT_SIZE", default_value_t = DEFAULT_MAX_ELEMENT_SIZE)
    )]
    pub max_element_size: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            avc_default_duration_ms: 40,
            keep_leading_non_key: false,
            ivf_max_deferred_frames: 64,
            progress_interval: 500,
            max_element_size: DEFAULT_MAX_ELEMENT_SIZE,
        }
    }
}

impl ExtractConfig {
    /// AVC fallback frame duration in nanoseconds.
    pub fn avc_default_duration_ns(&self) -> i64 {
        (self.avc_default_duration_ms as i64).saturating_mul(1_000_000)
    }
}
