use anyhow::{Context as _, Result};
use clap::Args;
use serde_json::{Map, Value};

use super::Context;
use crate::forge::{ApiRequest, Method};
use crate::output;

#[derive(Args, Debug)]
pub struct ApiArgs {
    /// API path, e.g. /user/me
    pub path: String,

    /// HTTP method: GET, POST, PUT or DELETE
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Field as key=value; query parameter for GET, JSON body field otherwise
    #[arg(short = 'f', long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,
}

pub async fn run(ctx: &mut Context, args: &ApiArgs) -> Result<()> {
    let method: Method = args.method.parse()?;
    let fields = parse_fields(&args.fields)?;
    let req = build_request(method, &args.path, fields)?;

    let mut body = Value::Null;
    ctx.client.execute_into(&ctx.cancel, &req, &mut body).await?;
    if !body.is_null() {
        let format = if ctx.format.is_machine() { ctx.format } else { output::OutputFormat::Json };
        output::print_data(format, &body)?;
    }
    Ok(())
}

fn parse_fields(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|field| {
            let (key, value) = field
                .split_once('=')
                .with_context(|| format!("Field {field:?} is not in key=value form"))?;
            Ok((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

fn build_request(method: Method, path: &str, fields: Vec<(String, String)>) -> Result<ApiRequest> {
    let path = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
    let mut req = ApiRequest::new(method, path);
    if fields.is_empty() {
        return Ok(req);
    }

    if method == Method::Get {
        for (key, value) in fields {
            req = req.query(&key, value);
        }
        return Ok(req);
    }

    let body: Map<String, Value> = fields
        .into_iter()
        .map(|(key, value)| (key, field_value(&value)))
        .collect();
    Ok(req.json(&body)?)
}

/// Numbers, booleans and null are sent typed; everything else as a string.
fn field_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_fields_become_query_pairs() {
        let fields = parse_fields(&["page=0".into(), "size=5".into()]).unwrap();
        let req = build_request(Method::Get, "user/me", fields).unwrap();
        assert_eq!(req.path, "/user/me");
        assert_eq!(req.query.len(), 2);
        assert!(req.body.is_none());
    }

    #[test]
    fn post_fields_become_typed_json() {
        let fields = parse_fields(&["title=Bug".into(), "localId=3".into(), "draft=false".into()]).unwrap();
        let req = build_request(Method::Post, "/project/o/p/issue", fields).unwrap();
        assert_eq!(req.body.unwrap(), json!({"title": "Bug", "localId": 3, "draft": false}));
    }

    #[test]
    fn malformed_field_is_rejected() {
        assert!(parse_fields(&["novalue".into()]).is_err());
    }

    #[test]
    fn unsupported_methods_fail_before_any_request() {
        assert!("PATCH".parse::<Method>().is_err());
    }
}
