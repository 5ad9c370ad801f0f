#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No handshake edge from the peer within the poll budget")]
    SymbolTimeout,

    #[error("Byte transfer aborted by a symbol timeout")]
    ByteTimeout,

    #[error("Byte 0x{byte:02x} not acknowledged after {attempts} attempts")]
    RetryExhausted { byte: u8, attempts: u32 },

    #[error("Port access failed: {0}")]
    Io(#[from] std::io::Error),
}
