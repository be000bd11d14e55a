//! Positional wire encoding of command batches.
//!
//! The engine reads one text payload per tick from the command buffer:
//!
//! ```text
//! {"commands": [{ "type": "Teleport", "params": [{ "value": "uav0" }, { "value": 1 }]}]}
//! ```
//!
//! followed by a single NUL byte. Each parameter is either a number or a
//! string; string parameters are JSON-escaped so configuration blobs
//! survive transport as one field.

use std::fmt::Write as _;

/// One positional parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    /// Numeric parameter.
    Number(f64),
    /// String parameter.
    Text(String),
}

/// A command reduced to its opcode and positional parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct WireCommand {
    /// Engine-side command type.
    pub opcode: &'static str,
    /// Parameters, in the engine's fixed order.
    pub params: Vec<Param>,
}

impl WireCommand {
    /// Start an encoding with no parameters.
    pub fn new(opcode: &'static str) -> Self {
        Self {
            opcode,
            params: Vec::new(),
        }
    }

    /// Append one number.
    pub fn number(&mut self, v: f64) {
        self.params.push(Param::Number(v));
    }

    /// Append several numbers in order.
    pub fn numbers(&mut self, vs: impl IntoIterator<Item = f32>) {
        self.params
            .extend(vs.into_iter().map(|v| Param::Number(f64::from(v))));
    }

    /// Append a boolean as `1` or `0`.
    pub fn flag(&mut self, v: bool) {
        self.number(if v { 1.0 } else { 0.0 });
    }

    /// Append one string.
    pub fn text(&mut self, s: &str) {
        self.params.push(Param::Text(s.to_string()));
    }

    /// Append this command's JSON object to `out`.
    pub fn write_json(&self, out: &mut String) {
        out.push_str("{ \"type\": ");
        push_json_string(out, self.opcode);
        out.push_str(", \"params\": [");
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str("{ \"value\": ");
            match p {
                Param::Number(v) => push_json_number(out, *v),
                Param::Text(s) => push_json_string(out, s),
            }
            out.push_str(" }");
        }
        out.push_str("]}");
    }
}

/// Encode a batch as the engine's command payload, NUL-terminated.
///
/// An empty batch still produces a valid envelope.
pub fn encode_batch<'a>(commands: impl IntoIterator<Item = &'a WireCommand>) -> Vec<u8> {
    let mut out = String::from("{\"commands\": [");
    for (i, cmd) in commands.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        cmd.write_json(&mut out);
    }
    out.push_str("]}");
    let mut bytes = out.into_bytes();
    bytes.push(0);
    bytes
}

fn push_json_number(out: &mut String, v: f64) {
    if v.is_finite() {
        // Writing to a String cannot fail.
        let _ = write!(out, "{v}");
    } else {
        out.push_str("null");
    }
}

fn push_json_string(out: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => out.push_str("\"\""),
    }
}
