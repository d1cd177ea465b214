//! CLI command definitions

use crate::builder::{Authorization, Request};
use clap::Args;

/// Handle one request
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to domain YAML file
    #[arg(short, long)]
    pub domain: String,

    /// Path to a YAML list of records to seed
    #[arg(short, long)]
    pub records: Option<String>,

    /// Request path, e.g. /folder/f1/edit
    #[arg(short, long)]
    pub path: String,

    /// HTTP method
    #[arg(short, long, default_value = "GET")]
    pub method: String,

    /// Query parameters (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,

    /// Form fields (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub form: Vec<(String, String)>,

    /// Signed-in user id
    #[arg(short, long)]
    pub user: Option<String>,

    /// Sign in as the domain owner
    #[arg(long, requires = "user")]
    pub owner: bool,

    /// Send as a fragment request
    #[arg(long)]
    pub partial: bool,
}

impl RunCommand {
    pub fn request(&self) -> Request {
        let mut request = Request::new(self.method.to_ascii_uppercase(), self.path.clone());
        for (key, value) in &self.query {
            request = request.with_query(key.clone(), value.clone());
        }
        for (key, value) in &self.form {
            request = request.with_form(key.clone(), value.clone());
        }
        if self.partial {
            request = request.partial();
        }
        request
    }

    pub fn authorization(&self) -> Authorization {
        match (&self.user, self.owner) {
            (Some(user), true) => Authorization::owner(user.clone()),
            (Some(user), false) => Authorization::user(user.clone()),
            (None, _) => Authorization::Anonymous,
        }
    }
}

/// Validate a domain configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to domain YAML file
    #[arg(short, long)]
    pub domain: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List templates and actions
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Path to domain YAML file
    #[arg(short, long)]
    pub domain: String,
}

/// List step kinds
#[derive(Debug, Args, Clone)]
pub struct KindsCommand {}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
