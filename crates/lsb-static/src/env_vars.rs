/// Declares all environment variables read by `linux-sandbox` and its crates.
pub struct EnvVars;

impl EnvVars {
    /// Equivalent to the `-D` command-line argument. If set, debug messages are printed to
    /// stderr and the resolved configuration is logged before it is handed off.
    pub const LSB_DEBUG: &'static str = "LSB_DEBUG";

    /// The maximum nesting depth of `@file` argument files.
    ///
    /// Argument files may reference further argument files; expansion fails once this many
    /// files are open at the same time. Defaults to 64.
    pub const LSB_MAX_ARGUMENT_FILE_DEPTH: &'static str = "LSB_MAX_ARGUMENT_FILE_DEPTH";

    /// Disables user-facing warnings.
    pub const LSB_NO_WARNINGS: &'static str = "LSB_NO_WARNINGS";

    /// Used to set the log filter for `tracing`, e.g. `RUST_LOG=lsb_fs=trace`.
    ///
    /// See the [tracing documentation](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#example-syntax)
    /// for more.
    pub const RUST_LOG: &'static str = "RUST_LOG";
}
