//! Portal error type and raw-message classifier.

use thiserror::Error;

/// Error type surfaced by portal driver implementations.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Login was rejected. Job-fatal: aborts the whole job, never retried.
    #[error("Usuário ou senha inválidos.")]
    InvalidCredentials,

    /// Any other driver failure, carrying the raw message for
    /// classification.
    #[error("{0}")]
    Failure(String),
}

/// Broad category a raw failure message falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An expected element was missing; the portal layout may have changed.
    LayoutChanged,
    /// The portal took too long to respond.
    Timeout,
    /// A captcha challenge appeared. Not automatable, never retried.
    Captcha,
    /// Browser or portal connectivity failure.
    Connectivity,
    /// The portal surfaced an internal fault signature.
    PortalFault,
    /// Nothing matched; the raw message is passed through.
    Unknown,
}

/// A classified failure with a human-readable cause and retry policy.
#[derive(Debug, Clone)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

/// Raw-signature classification table: (needles, kind, cause, retryable).
/// Matching is case-insensitive substring search over the raw message,
/// first hit wins.
const CLASSIFICATION_TABLE: &[(&[&str], ErrorKind, &str, bool)] = &[
    (
        &["no such element"],
        ErrorKind::LayoutChanged,
        "Elemento esperado não foi encontrado no site. O layout pode ter mudado.",
        true,
    ),
    (
        &["timeout"],
        ErrorKind::Timeout,
        "O site demorou demais para responder. Tente novamente mais tarde ou reduza o período de busca.",
        true,
    ),
    (
        &["captcha"],
        ErrorKind::Captcha,
        "O site solicitou validação captcha e não é possível automatizar esse passo.",
        false,
    ),
    (
        &["connection refused", "connectionreseterror"],
        ErrorKind::Connectivity,
        "Falha na conexão com o navegador ou o site está fora do ar.",
        true,
    ),
    (
        &["stacktrace", "gethandleverifier"],
        ErrorKind::PortalFault,
        "Ocorreu um erro inesperado ao acessar o portal SEFAZ. Tente novamente mais tarde.",
        true,
    ),
];

const UNKNOWN_CAUSE: &str = "Erro desconhecido ao executar o robô.";

/// Classify a raw driver failure message.
pub fn classify(raw: &str) -> ClassifiedError {
    let lowered = raw.trim().to_lowercase();

    for (needles, kind, cause, retryable) in CLASSIFICATION_TABLE {
        if needles.iter().any(|needle| lowered.contains(needle)) {
            return ClassifiedError {
                kind: *kind,
                message: (*cause).to_string(),
                retryable: *retryable,
            };
        }
    }

    let trimmed = raw.trim();
    let message = if trimmed.is_empty() || trimmed == "Message:" {
        UNKNOWN_CAUSE.to_string()
    } else {
        trimmed.to_string()
    };

    ClassifiedError {
        kind: ErrorKind::Unknown,
        message,
        retryable: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_element_not_found() {
        let classified = classify("Message: no such element: Unable to locate element");
        assert_eq!(classified.kind, ErrorKind::LayoutChanged);
        assert!(classified.retryable);
        assert!(classified.message.contains("layout pode ter mudado"));
    }

    #[test]
    fn test_classify_timeout() {
        let classified = classify("TimeoutException: page load timeout");
        assert_eq!(classified.kind, ErrorKind::Timeout);
        assert!(classified.retryable);
    }

    #[test]
    fn test_classify_captcha_is_terminal() {
        let classified = classify("CAPTCHA challenge detected on page");
        assert_eq!(classified.kind, ErrorKind::Captcha);
        assert!(!classified.retryable);
    }

    #[test]
    fn test_classify_connectivity() {
        for raw in ["Connection refused by host", "ConnectionResetError(104)"] {
            let classified = classify(raw);
            assert_eq!(classified.kind, ErrorKind::Connectivity);
            assert!(classified.retryable);
        }
    }

    #[test]
    fn test_classify_portal_fault_signature() {
        let classified = classify("unknown error\nStacktrace:\n#0 GetHandleVerifier");
        assert_eq!(classified.kind, ErrorKind::PortalFault);
        assert!(classified.message.contains("erro inesperado"));
    }

    #[test]
    fn test_unmatched_message_passes_through() {
        let classified = classify("some completely novel failure");
        assert_eq!(classified.kind, ErrorKind::Unknown);
        assert_eq!(classified.message, "some completely novel failure");
        assert!(classified.retryable);
    }

    #[test]
    fn test_empty_message_gets_fallback_cause() {
        for raw in ["", "   ", "Message:"] {
            let classified = classify(raw);
            assert_eq!(classified.message, UNKNOWN_CAUSE);
        }
    }
}
