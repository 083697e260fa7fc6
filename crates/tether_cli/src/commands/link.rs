//! Deep link command implementation.

use tether_net::{generate_deep_link, parse_deep_link};

/// Runs `link parse`.
pub fn parse(link: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = parse_deep_link(link)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        _ => {
            println!("Scheme: {}", parsed.scheme);
            println!("Path:   {}", parsed.path);
            if !parsed.params.is_empty() {
                println!("Params:");
                for (name, value) in &parsed.params {
                    println!("  {name} = {value}");
                }
            }
        }
    }

    Ok(())
}

/// Runs `link make`.
pub fn make(scheme: &str, path: &str, params: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let pairs = parse_params(params)?;
    println!("{}", generate_deep_link(scheme, path, pairs)?);
    Ok(())
}

/// Splits `name=value` arguments. The value may itself contain `=`.
fn parse_params(params: &[String]) -> Result<Vec<(&str, &str)>, String> {
    params
        .iter()
        .map(|param| {
            param
                .split_once('=')
                .ok_or_else(|| format!("Parameter '{param}' must look like name=value"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_split_on_first_equals() {
        let raw = vec!["id=42".to_string(), "q=a=b".to_string(), "empty=".to_string()];
        let pairs = parse_params(&raw).unwrap();
        assert_eq!(pairs, [("id", "42"), ("q", "a=b"), ("empty", "")]);
    }

    #[test]
    fn param_without_equals_is_rejected() {
        let raw = vec!["flag".to_string()];
        assert!(parse_params(&raw).unwrap_err().contains("flag"));
    }

    #[test]
    fn parse_rejects_missing_scheme() {
        assert!(parse("not a link", "text").is_err());
    }

    #[test]
    fn make_accepts_valid_input() {
        let raw = vec!["id=1".to_string()];
        assert!(make("myapp", "items/1", &raw).is_ok());
        assert!(make("1bad", "items", &raw).is_err());
    }
}
