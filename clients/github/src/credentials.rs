use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CredentialError {
    #[error("All {0} API credentials have been exhausted")]
    Exhausted(usize),
    #[error("API credential #{0} is not a valid header value")]
    Invalid(usize),
}

/// Ordered API credentials with a cursor that only moves forward.
///
/// Not meant for concurrent callers, the client keeps it behind a lock.
#[derive(Debug)]
pub struct CredentialRotator {
    headers: Vec<HeaderValue>,
    cursor: usize,
}

impl CredentialRotator {
    pub fn new(tokens: &[SecretString]) -> Result<Self, CredentialError> {
        let headers = tokens
            .iter()
            .enumerate()
            .map(|(index, token)| {
                let mut header = HeaderValue::from_str(&format!("token {}", token.expose_secret()))
                    .map_err(|_| CredentialError::Invalid(index))?;
                header.set_sensitive(true);
                Ok(header)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CredentialRotator { headers, cursor: 0 })
    }

    /// Authorization header of the current credential, `None` when requests go unauthenticated.
    pub fn current_header(&self) -> Option<&HeaderValue> {
        self.headers.get(self.cursor)
    }

    pub fn advance(&mut self) -> Result<(), CredentialError> {
        if self.cursor + 1 >= self.headers.len() {
            return Err(CredentialError::Exhausted(self.headers.len()));
        }
        self.cursor += 1;
        Ok(())
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}
