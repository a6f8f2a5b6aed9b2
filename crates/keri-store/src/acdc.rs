//! ACDC (Authentic Chained Data Container): a content-addressed
//! credential envelope with no chain-order constraint at this layer
//! (chaining is enforced by the TEL that anchors it).
//!
//! No direct analogue in `keriox`; modelled using the same
//! self-addressing container idiom as `KelEvent`/`TelEvent`.

use serde::{Deserialize, Serialize};

use crate::said::SaidField;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acdc {
    #[serde(rename = "d")]
    pub said: String,
    /// Issuer AID.
    #[serde(rename = "i")]
    pub issuer: String,
    /// Schema SAID.
    #[serde(rename = "s")]
    pub schema: String,
    /// Subject attribute block, opaque to this layer.
    #[serde(rename = "a")]
    pub subject: serde_json::Value,
}

impl SaidField for Acdc {
    fn said(&self) -> &str {
        &self.said
    }
    fn set_said(&mut self, said: String) {
        self.said = said;
    }
}

impl Acdc {
    pub fn new(issuer: String, schema: String, subject: serde_json::Value) -> Self {
        let mut acdc = Acdc {
            said: String::new(),
            issuer,
            schema,
            subject,
        };
        acdc.said = crate::said::compute_said(&acdc).expect("Acdc always serializes");
        acdc
    }
}
