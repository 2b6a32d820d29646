//! # tessera-kernel
//!
//! The portable half of Tessera's dual execution model. Compositing nodes
//! describe their per-pixel math as a [`ast::KernelDef`]; this crate turns it
//! into a WGSL compute shader ([`KernelDescriptor`]) for backends without
//! interactive GPU blending, and evaluates it on the CPU as a reference.

pub mod ast;
pub mod codegen;
pub mod interp;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tessera_core::hash::{self, ContentHash};
use tessera_core::TesseraError;

use crate::ast::KernelDef;

/// A named, parameter-free compute kernel. Pure data: it owns no GPU
/// resources and is generated fresh on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelDescriptor {
    pub name: String,
    pub source: String,
}

impl KernelDescriptor {
    /// SHA-256 over name and source.
    pub fn fingerprint(&self) -> ContentHash {
        hash::hash_text(&[&self.name, &self.source])
    }
}

/// Validate a kernel definition and generate its WGSL descriptor.
pub fn compile(def: &KernelDef) -> Result<KernelDescriptor, TesseraError> {
    validate(def)?;
    let source = codegen::Codegen::new().generate(def)?;
    Ok(KernelDescriptor {
        name: def.name.clone(),
        source,
    })
}

const RESERVED: &[&str] = &["i", "global_id", "fn", "let", "var", "return", "if", "vec4", "array"];

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !name.starts_with("__")
}

fn validate(def: &KernelDef) -> Result<(), TesseraError> {
    let bad_name = |what: &str, name: &str| {
        TesseraError::Kernel(format!(
            "kernel {}: {} '{}' is not a usable identifier",
            def.name, what, name
        ))
    };

    if !is_identifier(&def.name) || RESERVED.contains(&def.name.as_str()) {
        return Err(bad_name("name", &def.name));
    }

    // Every name that lands in the generated module's scope.
    let mut scope: HashSet<String> = HashSet::new();
    scope.insert(def.name.clone());
    for input in &def.inputs {
        if !is_identifier(input) || RESERVED.contains(&input.as_str()) {
            return Err(bad_name("input", input));
        }
        for name in [input.clone(), format!("{}_in", input)] {
            if !scope.insert(name.clone()) {
                return Err(TesseraError::Kernel(format!(
                    "kernel {}: name '{}' is declared twice",
                    def.name, name
                )));
            }
        }
    }
    if !is_identifier(&def.output) || RESERVED.contains(&def.output.as_str()) {
        return Err(bad_name("output", &def.output));
    }
    if scope.contains(&def.output) {
        return Err(TesseraError::Kernel(format!(
            "kernel {}: output '{}' collides with another name",
            def.name, def.output
        )));
    }

    for expr in &def.channels {
        let mut unknown = None;
        expr.for_each_input(&mut |name| {
            if unknown.is_none() && !def.inputs.iter().any(|i| i == name) {
                unknown = Some(name.to_string());
            }
        });
        if let Some(name) = unknown {
            return Err(TesseraError::Kernel(format!(
                "kernel {} references unknown input '{}'",
                def.name, name
            )));
        }
    }
    Ok(())
}
