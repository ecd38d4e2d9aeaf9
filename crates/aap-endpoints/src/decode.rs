//! Request body decoding.
//!
//! A body is a JSON array. Each item is verified against the endpoint's
//! schema, then deserialized. An item that fails either step is kept in the
//! batch as a failed `Decoded` so the executor reports it at its own index
//! and aborts the rest before any transaction opens.

use serde::de::DeserializeOwned;
use serde_json::Value;

use aap_contracts::error::{AapError, AapResult};
use aap_core::traits::Validate;
use aap_verify::{RequestSchema, RequestVerifier};

/// One decoded sub-request, or the reason it could not be decoded.
#[derive(Debug, Clone)]
pub struct Decoded<I>(pub AapResult<I>);

impl<I> Decoded<I> {
    /// The decoded input. Only `Err` for items the executor's validation
    /// gate already rejected.
    pub fn input(&self) -> AapResult<&I> {
        self.0.as_ref().map_err(Clone::clone)
    }
}

impl<I: Validate> Validate for Decoded<I> {
    fn validate(&self) -> AapResult<()> {
        match &self.0 {
            Ok(input) => input.validate(),
            Err(err) => Err(err.clone()),
        }
    }
}

/// Decode `body` into one `Decoded` per array item.
///
/// `stamp` runs on every successfully deserialized item, before validation;
/// endpoints use it to fill fields derived from the caller.
///
/// # Errors
///
/// `InputValidation` if `body` is not a JSON array.
pub fn decode_batch<I, S>(
    verifier: &RequestVerifier,
    schema: &RequestSchema,
    body: &Value,
    mut stamp: S,
) -> AapResult<Vec<Decoded<I>>>
where
    I: DeserializeOwned,
    S: FnMut(&mut I),
{
    let items = body
        .as_array()
        .ok_or_else(|| AapError::invalid("request body must be a JSON array"))?;

    Ok(items
        .iter()
        .map(|item| -> AapResult<I> {
            verifier.verify(item, schema).into_result()?;
            let mut input: I = serde_json::from_value(item.clone())
                .map_err(|e| AapError::invalid(format!("malformed request: {e}")))?;
            stamp(&mut input);
            Ok(input)
        })
        .map(Decoded)
        .collect())
}
