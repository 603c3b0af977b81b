//! Template filters for compose manifests and configuration files

use base64::Engine as _;
use minijinja::{Error, ErrorKind, Value};

/// Filters registered on every environment, in addition to MiniJinja builtins
pub const AVAILABLE_FILTERS: &[&str] = &[
    "toyaml",
    "tojson",
    "b64encode",
    "b64decode",
    "quote",
    "squote",
    "envquote",
    "nindent",
    "indent",
    "required",
    "empty",
    "sha256",
    "trimprefix",
    "trimsuffix",
    "ipv4",
];

fn invalid(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, message.into())
}

fn as_text(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

/// Convert a value to YAML
///
/// Usage: {{ labels | toyaml | indent(6) }}
pub fn toyaml(value: Value) -> Result<String, Error> {
    let json_value: serde_json::Value =
        serde_json::to_value(&value).map_err(|e| invalid(e.to_string()))?;

    let yaml = serde_yaml::to_string(&json_value).map_err(|e| invalid(e.to_string()))?;

    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

/// Convert a value to compact JSON
pub fn tojson(value: Value) -> Result<String, Error> {
    let json_value: serde_json::Value =
        serde_json::to_value(&value).map_err(|e| invalid(e.to_string()))?;

    serde_json::to_string(&json_value).map_err(|e| invalid(e.to_string()))
}

#[must_use]
pub fn b64encode(value: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

pub fn b64decode(value: String) -> Result<String, Error> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(value.as_bytes())
        .map_err(|e| invalid(format!("base64 decode error: {}", e)))?;

    String::from_utf8(decoded).map_err(|e| invalid(format!("UTF-8 decode error: {}", e)))
}

/// Double quotes with escaping, for YAML scalars
#[must_use]
pub fn quote(value: Value) -> String {
    let s = as_text(&value);
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[must_use]
pub fn squote(value: Value) -> String {
    format!("'{}'", as_text(&value).replace('\'', "''"))
}

/// Quote a value the way `.env` files are written
///
/// Usage: DB_PASS={{ secrets.DB_PASS | envquote }}
#[must_use]
pub fn envquote(value: Value) -> String {
    let s = as_text(&value);
    if s.contains('"') {
        format!("'{}'", s)
    } else {
        format!("\"{}\"", s)
    }
}

/// Newline followed by the indented text
///
/// Usage: {{ labels | toyaml | nindent(6) }}
#[must_use]
pub fn nindent(value: String, spaces: usize) -> String {
    format!("\n{}", indent(value, spaces))
}

/// Indent every non-empty line
pub fn indent(value: String, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    value
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fail the render when a value is undefined, none or an empty string
///
/// Usage: {{ dns.domain | required("dns.domain must be set") }}
pub fn required(value: Value, message: Option<String>) -> Result<Value, Error> {
    let missing = value.is_undefined()
        || value.is_none()
        || value.as_str().map(str::is_empty).unwrap_or(false);

    if missing {
        Err(invalid(
            message.unwrap_or_else(|| "required value is missing".to_string()),
        ))
    } else {
        Ok(value)
    }
}

/// Usage: {% if volumes.logs | empty %}
pub fn empty(value: Value) -> bool {
    if value.is_undefined() || value.is_none() {
        return true;
    }

    match value.as_str() {
        Some(s) => s.is_empty(),
        None => value.len().map(|len| len == 0).unwrap_or(false),
    }
}

pub fn sha256sum(value: String) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn trimprefix(value: String, prefix: String) -> String {
    value.strip_prefix(&prefix).unwrap_or(&value).to_string()
}

pub fn trimsuffix(value: String, suffix: String) -> String {
    value.strip_suffix(&suffix).unwrap_or(&value).to_string()
}

/// Dotted address from a `[a, b, c, d]` network with the last octet replaced
///
/// Usage: {{ networks.default.cidr | ipv4(10) }} renders `172.19.0.10`
pub fn ipv4(value: Value, host: Option<u8>) -> Result<String, Error> {
    let octets: Vec<u8> = serde_json::to_value(&value)
        .ok()
        .and_then(|v| serde_json::from_value(v).ok())
        .ok_or_else(|| invalid("ipv4 expects a list of four octets"))?;

    let [a, b, c, d] = octets[..] else {
        return Err(invalid(format!(
            "ipv4 expects four octets, got {}",
            octets.len()
        )));
    };

    Ok(format!("{}.{}.{}.{}", a, b, c, host.unwrap_or(d)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toyaml() {
        let value = Value::from_serialize(serde_json::json!({
            "traefik.enable": "true",
            "port": 8080
        }));
        let yaml = toyaml(value).unwrap();
        assert!(yaml.contains("traefik.enable: 'true'"));
        assert!(yaml.contains("port: 8080"));
        assert!(!yaml.ends_with('\n'));
    }

    #[test]
    fn test_b64_round_trip() {
        let encoded = b64encode("hello world".to_string());
        assert_eq!(encoded, "aGVsbG8gd29ybGQ=");
        assert_eq!(b64decode(encoded).unwrap(), "hello world");
        assert!(b64decode("***".to_string()).is_err());
    }

    #[test]
    fn test_quotes() {
        assert_eq!(quote(Value::from("a\"b")), "\"a\\\"b\"");
        assert_eq!(squote(Value::from("it's")), "'it''s'");
        assert_eq!(envquote(Value::from("plain")), "\"plain\"");
        assert_eq!(envquote(Value::from("has\"quote")), "'has\"quote'");
        assert_eq!(quote(Value::from(42)), "\"42\"");
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\n\nb".to_string(), 2), "  a\n\n  b");
        assert_eq!(nindent("a\nb".to_string(), 4), "\n    a\n    b");
    }

    #[test]
    fn test_required() {
        assert!(required(Value::from("x"), None).is_ok());
        assert!(required(Value::UNDEFINED, None).is_err());
        assert!(required(Value::from(""), Some("needed".to_string())).is_err());
        assert!(required(Value::from(0), None).is_ok());
    }

    #[test]
    fn test_empty() {
        assert!(empty(Value::UNDEFINED));
        assert!(empty(Value::from("")));
        assert!(empty(Value::from_serialize(Vec::<i32>::new())));
        assert!(!empty(Value::from("x")));
        assert!(!empty(Value::from(1)));
    }

    #[test]
    fn test_trim() {
        assert_eq!(trimprefix("v1.2".to_string(), "v".to_string()), "1.2");
        assert_eq!(trimsuffix("a.hbs".to_string(), ".hbs".to_string()), "a");
    }

    #[test]
    fn test_ipv4() {
        let cidr = Value::from_serialize([172u8, 19, 0, 0]);
        assert_eq!(ipv4(cidr.clone(), Some(10)).unwrap(), "172.19.0.10");
        assert_eq!(ipv4(cidr, None).unwrap(), "172.19.0.0");
        assert!(ipv4(Value::from_serialize([1, 2]), None).is_err());
        assert!(ipv4(Value::from("nope"), None).is_err());
    }

    #[test]
    fn test_sha256() {
        assert_eq!(
            sha256sum("abc".to_string()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
