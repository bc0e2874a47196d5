// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host type names to engine type names.
//!
//! All functions here are pure: the same descriptor always yields the same
//! class name, in every process, so classes registered by a writer are
//! found again by a reader.

use crate::types::descriptor::{FieldKind, ScalarKind, TypeDescriptor};

/// Engine typedef of a scalar kind.
pub fn scalar_type_name(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Bool => "Bool_t",
        ScalarKind::I8 => "Char_t",
        ScalarKind::U8 => "UChar_t",
        ScalarKind::I16 => "Short_t",
        ScalarKind::U16 => "UShort_t",
        ScalarKind::I32 => "Int_t",
        ScalarKind::U32 => "UInt_t",
        ScalarKind::I64 => "Long64_t",
        ScalarKind::U64 => "ULong64_t",
        ScalarKind::F32 => "Float_t",
        ScalarKind::F64 => "Double_t",
    }
}

/// Engine class name of a composite descriptor.
///
/// Module path segments are kept (`app::events::Event`). Generic arguments
/// are spelled with engine type names (`Pair<f64>` becomes
/// `Pair<Double_t>`, `Vec<u8>` becomes `vector<UChar_t>`). Whitespace and
/// raw-identifier prefixes are dropped; any other character outside
/// `[A-Za-z0-9_:<>,]` is replaced with `_`.
pub fn translate_name(desc: &TypeDescriptor) -> String {
    let path = desc.name().replace("r#", "");
    let mut out = String::with_capacity(path.len());
    let mut token = String::new();
    let mut depth = 0usize;

    for c in path.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            token.push(c);
            continue;
        }
        flush_token(&mut token, depth, &mut out);
        match c {
            '<' => {
                depth += 1;
                out.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                out.push(c);
            }
            ':' | ',' => out.push(c),
            c if c.is_whitespace() => {}
            _ => out.push('_'),
        }
    }
    flush_token(&mut token, depth, &mut out);
    out
}

fn flush_token(token: &mut String, depth: usize, out: &mut String) {
    if token.is_empty() {
        return;
    }
    if depth > 0 {
        out.push_str(generic_arg_name(token));
    } else {
        out.push_str(token);
    }
    token.clear();
}

fn generic_arg_name(token: &str) -> &str {
    match token {
        "bool" => scalar_type_name(ScalarKind::Bool),
        "i8" => scalar_type_name(ScalarKind::I8),
        "u8" => scalar_type_name(ScalarKind::U8),
        "i16" => scalar_type_name(ScalarKind::I16),
        "u16" => scalar_type_name(ScalarKind::U16),
        "i32" => scalar_type_name(ScalarKind::I32),
        "u32" => scalar_type_name(ScalarKind::U32),
        "i64" => scalar_type_name(ScalarKind::I64),
        "u64" => scalar_type_name(ScalarKind::U64),
        "f32" => scalar_type_name(ScalarKind::F32),
        "f64" => scalar_type_name(ScalarKind::F64),
        "String" => "string",
        "Vec" => "vector",
        other => other,
    }
}

/// Engine type name of a member field (used in class dumps).
pub fn foreign_type_name(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Scalar(k) => scalar_type_name(*k).to_string(),
        FieldKind::Array { element, len } => format!("{}[{}]", foreign_type_name(element), len),
        FieldKind::Sequence { element, .. } => format!("vector<{}>", foreign_type_name(element)),
        FieldKind::Text => "string".to_string(),
        FieldKind::Composite(desc) => translate_name(desc),
    }
}

/// Single-character leaf type code.
pub fn leaf_code(kind: ScalarKind) -> char {
    match kind {
        ScalarKind::I8 => 'B',
        ScalarKind::U8 => 'b',
        ScalarKind::I16 => 'S',
        ScalarKind::U16 => 's',
        ScalarKind::I32 => 'I',
        ScalarKind::U32 => 'i',
        ScalarKind::I64 => 'L',
        ScalarKind::U64 => 'l',
        ScalarKind::F32 => 'F',
        ScalarKind::F64 => 'D',
        ScalarKind::Bool => 'O',
    }
}

/// Inverse of [`leaf_code`].
pub fn scalar_for_code(code: char) -> Option<ScalarKind> {
    let kind = match code {
        'B' => ScalarKind::I8,
        'b' => ScalarKind::U8,
        'S' => ScalarKind::I16,
        's' => ScalarKind::U16,
        'I' => ScalarKind::I32,
        'i' => ScalarKind::U32,
        'L' => ScalarKind::I64,
        'l' => ScalarKind::U64,
        'F' => ScalarKind::F32,
        'D' => ScalarKind::F64,
        'O' => ScalarKind::Bool,
        _ => return None,
    };
    Some(kind)
}

/// Leaf list string for a leaf branch (`"evt_i/L"`).
pub fn leaf_list(name: &str, kind: ScalarKind) -> String {
    format!("{}/{}", name, leaf_code(kind))
}
