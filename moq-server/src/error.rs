use std::sync::Arc;

/// Anything fatal to a connection or to the server itself.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("moq error: {0}")]
	Moq(#[from] moq_core::Error),

	/// The server is or became shut down; the only error a second
	/// [crate::Server::close] or [crate::Server::shutdown] returns.
	#[error("server closed")]
	Closed,

	#[error("setup did not complete in time")]
	SetupTimeout,

	#[error("tls configuration required")]
	MissingTls,

	#[error("tls error: {0}")]
	Tls(String),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("unsupported protocol: {0:?}")]
	UnsupportedProtocol(Option<String>),

	#[error("origin not allowed")]
	OriginRejected,

	#[error("webtransport upgrade failed: {0}")]
	Upgrade(Arc<dyn std::error::Error + Send + Sync>),
}
