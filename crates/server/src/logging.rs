use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = info for the gateway, warn for dependency noise
	// 1 (-v) = debug for the gateway
	// 2+ (-vv) = trace everything
	let filter = match verbosity {
		0 => "warn,gridgate_server=info,gridgate_runtime=info",
		1 => "info,gridgate_server=debug,gridgate_runtime=debug",
		_ => "trace",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
