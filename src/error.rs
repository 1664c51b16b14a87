use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Security initialization failed: {0}")] SecurityInit(String),

    #[error("Encryption error: {0}")] Encryption(String),

    #[error("Decryption failed: {0}")] Decryption(String),

    #[error("Key store error: {0}")] KeyStore(String),

    #[error("Database error: {0}")] Database(#[from] sea_orm::DbErr),

    #[error("Unsupported chain: {0}")] UnsupportedChain(String),

    #[error("Wallet not found")]
    WalletNotFound,

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Invalid address")]
    InvalidAddress,

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Insufficient funds: requested {requested}, available {available}")] InsufficientFunds {
        requested: String,
        available: String,
    },

    #[error("Balance query failed: {0}")] BalanceQuery(String),

    #[error("Broadcast failed: {0}")] Broadcast(String),

    #[error("Transfer failed: {0}")] TransferFailed(#[source] Box<AppError>),

    #[error("Invalid status transition from {from} to {to}")] InvalidStatusTransition {
        from: String,
        to: String,
    },

    #[error("Invalid input: {0}")] InvalidInput(String),

    #[error("Chain error: {0}")] Chain(String),

    #[error("RPC error: {0}")] Rpc(String),

    #[error("Configuration error: {0}")] Config(String),

    #[error("Internal error: {0}")] Internal(String),
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// Wrap an adapter-stage failure. Already-wrapped errors are passed through.
    pub fn transfer_failed(cause: AppError) -> Self {
        match cause {
            AppError::TransferFailed(_) => cause,
            other => AppError::TransferFailed(Box::new(other)),
        }
    }

    /// The innermost error behind any `TransferFailed` layers.
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::TransferFailed(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// Stable machine-readable code for the UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::SecurityInit(_) => "SECURITY_INIT_ERROR",
            AppError::Encryption(_) => "ENCRYPTION_ERROR",
            AppError::Decryption(_) => "DECRYPTION_ERROR",
            AppError::KeyStore(_) => "KEY_STORE_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::UnsupportedChain(_) => "UNSUPPORTED_CHAIN",
            AppError::WalletNotFound => "WALLET_NOT_FOUND",
            AppError::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            AppError::InvalidAddress => "INVALID_ADDRESS",
            AppError::InvalidPrivateKey => "INVALID_PRIVATE_KEY",
            AppError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            AppError::BalanceQuery(_) => "BALANCE_QUERY_ERROR",
            AppError::Broadcast(_) => "BROADCAST_ERROR",
            AppError::TransferFailed(_) => "TRANSFER_FAILED",
            AppError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::Chain(_) => "CHAIN_ERROR",
            AppError::Rpc(_) => "RPC_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let field = match self.root_cause() {
            AppError::InvalidAddress => Some("to_address".to_string()),
            AppError::InsufficientFunds { .. } => Some("amount".to_string()),
            AppError::InvalidPrivateKey => Some("private_key".to_string()),
            _ => None,
        };

        ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                field,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
