use crate::models::OrderStatus;

/// Unified error type for store, gateway and orchestration failures.
///
/// Validation and ownership errors carry enough context to build a specific
/// user-facing reply; gateway errors are already classified at the adapter
/// boundary and never wrap a raw transport error.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("user is not registered")]
    NotRegistered,

    #[error("cart is empty")]
    EmptyCart,

    #[error("items missing required fields: {0:?}")]
    IncompleteItems(Vec<String>),

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("order belongs to another user")]
    NotOwner,

    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("invalid catalog input: {0}")]
    CatalogValidation(String),

    #[error("category {0} already exists")]
    DuplicateCategory(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Serialization(err.to_string())
    }
}

impl ServiceError {
    /// Whether the caller should be offered a retry of the same action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayUnavailable(_))
    }

    /// The reply text shown to the end user. This is the single mapping point
    /// from the error taxonomy to conversation output; internal errors never
    /// leak details here.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotRegistered => {
                "❌ Você precisa estar registrado para fazer uma compra. Use /start para se registrar."
                    .to_string()
            }
            Self::EmptyCart => {
                "❌ Seu carrinho está vazio. Adicione produtos antes de finalizar a compra."
                    .to_string()
            }
            Self::IncompleteItems(names) => format!(
                "❌ Estes itens estão com dados incompletos: {}. Remova-os e adicione novamente.",
                names.join(", ")
            ),
            Self::OrderNotFound(_) => {
                "❌ Pedido não encontrado. Por favor, tente novamente.".to_string()
            }
            Self::NotOwner => "❌ Você não tem permissão para ver este pedido.".to_string(),
            Self::GatewayUnavailable(_) => {
                "❌ Não foi possível falar com o sistema de pagamento. Por favor, tente novamente em instantes."
                    .to_string()
            }
            Self::GatewayRejected(_) => {
                "❌ Ocorreu um erro ao processar o pagamento PIX. Por favor, tente novamente mais tarde."
                    .to_string()
            }
            Self::CatalogValidation(reason) => format!("❌ Dados inválidos: {reason}"),
            Self::DuplicateCategory(name) => {
                format!("❌ A categoria \"{name}\" já existe.")
            }
            Self::InvalidTransition { from, to } => {
                format!("❌ Não é possível mudar o pedido de \"{from}\" para \"{to}\".")
            }
            Self::NotFound(what) => format!("❌ Não encontrado: {what}."),
            // Unexpected failures collapse into a generic retry prompt.
            Self::Serialization(_) | Self::Other(_) => {
                "❌ Ocorreu um erro. Por favor, tente novamente mais tarde.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_items_names_every_offender() {
        let err = ServiceError::IncompleteItems(vec![
            "NINJA PLAYER".to_string(),
            "CLOUDDY".to_string(),
        ]);
        let msg = err.user_message();
        assert!(msg.contains("NINJA PLAYER"));
        assert!(msg.contains("CLOUDDY"));
    }

    #[test]
    fn internal_errors_collapse_to_generic_message() {
        let err = ServiceError::Serialization("unexpected EOF at line 3".to_string());
        assert!(!err.user_message().contains("EOF"));

        let err = ServiceError::Other(anyhow::anyhow!("poisoned lock"));
        assert!(!err.user_message().contains("poisoned"));
    }

    #[test]
    fn only_gateway_unavailable_is_retryable() {
        assert!(ServiceError::GatewayUnavailable("timeout".into()).is_retryable());
        assert!(!ServiceError::GatewayRejected("400".into()).is_retryable());
        assert!(!ServiceError::EmptyCart.is_retryable());
    }
}
