/*!
# Expression Function Catalog

Fixed catalog of the XPath and InfoPath extension functions that appear in
view conditions and manifest rules, with a string-pattern fallback for
names outside the catalog. Consumers use this to tell calculated
expressions from plain field references; no expression is evaluated here.
*/

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Broad category of a function, by what it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCategory {
    String,
    Numeric,
    Boolean,
    DateTime,
    NodeSet,
    Document,
    Unknown,
}

/// One catalog entry
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: &'static str,
    /// Human-readable parameter list, e.g. `(string, string)`
    pub signature: &'static str,
    pub category: FunctionCategory,
}

static CATALOG: Lazy<HashMap<&'static str, FunctionSignature>> = Lazy::new(|| {
    use FunctionCategory::*;
    let entries = [
        ("concat", "(string, string, ...)", String),
        ("contains", "(string, string)", Boolean),
        ("starts-with", "(string, string)", Boolean),
        ("substring", "(string, number, number?)", String),
        ("substring-before", "(string, string)", String),
        ("substring-after", "(string, string)", String),
        ("string-length", "(string?)", Numeric),
        ("normalize-space", "(string?)", String),
        ("translate", "(string, string, string)", String),
        ("string", "(object?)", String),
        ("number", "(object?)", Numeric),
        ("sum", "(node-set)", Numeric),
        ("count", "(node-set)", Numeric),
        ("floor", "(number)", Numeric),
        ("ceiling", "(number)", Numeric),
        ("round", "(number)", Numeric),
        ("boolean", "(object)", Boolean),
        ("not", "(boolean)", Boolean),
        ("true", "()", Boolean),
        ("false", "()", Boolean),
        ("position", "()", Numeric),
        ("last", "()", Numeric),
        ("name", "(node-set?)", String),
        ("local-name", "(node-set?)", String),
        ("xdMath:Avg", "(node-set)", Numeric),
        ("xdMath:Max", "(node-set)", Numeric),
        ("xdMath:Min", "(node-set)", Numeric),
        ("xdMath:Eval", "(node-set, expression)", Numeric),
        ("xdMath:Nz", "(node-set)", Numeric),
        ("xdDate:Today", "()", DateTime),
        ("xdDate:Now", "()", DateTime),
        ("xdDate:AddDays", "(date, number)", DateTime),
        ("xdDate:AddSeconds", "(time, number)", DateTime),
        ("xdXDocument:get-DOM", "()", Document),
        ("xdXDocument:GetDOM", "(string)", Document),
        ("xdXDocument:get-Role", "()", String),
        ("xdUser:get-UserName", "()", String),
        ("xdEnvironment:IsBrowser", "()", Boolean),
        ("xdEnvironment:IsMobile", "()", Boolean),
    ];
    entries
        .into_iter()
        .map(|(name, signature, category)| {
            (
                name,
                FunctionSignature {
                    name,
                    signature,
                    category,
                },
            )
        })
        .collect()
});

/// Looks up a function by its exact name
pub fn lookup(name: &str) -> Option<&'static FunctionSignature> {
    CATALOG.get(name)
}

/// Classifies a function name: exact catalog match first, then prefix and
/// suffix patterns for names outside the catalog
pub fn classify_function(name: &str) -> FunctionCategory {
    if let Some(signature) = lookup(name) {
        return signature.category;
    }
    if let Some((prefix, rest)) = name.split_once(':') {
        return match prefix {
            "xdMath" => FunctionCategory::Numeric,
            "xdDate" => FunctionCategory::DateTime,
            "xdXDocument" => FunctionCategory::Document,
            "xdUser" | "xdFormatting" => FunctionCategory::String,
            "xdEnvironment" => FunctionCategory::Boolean,
            _ => classify_by_shape(rest),
        };
    }
    classify_by_shape(name)
}

fn classify_by_shape(name: &str) -> FunctionCategory {
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("is") || lower.starts_with("has") {
        return FunctionCategory::Boolean;
    }
    if lower.contains("date") || lower.contains("time") {
        return FunctionCategory::DateTime;
    }
    if lower.contains("count") || lower.contains("sum") || lower.contains("avg") {
        return FunctionCategory::Numeric;
    }
    FunctionCategory::Unknown
}

/// True when the token is a known callable rather than a field reference
pub fn is_known_function(name: &str) -> bool {
    lookup(name).is_some()
}
