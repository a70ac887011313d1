//! Infrastructure declarations emitted by stages, serialized as Terraform JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One block of a stage's Terraform document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceDeclaration {
    /// State backend, `terraform.backend.<backend>`.
    Backend {
        /// Backend type (`kubernetes`, `s3`, `gcs`, `azurerm`, `local`).
        backend: String,
        /// Backend settings.
        config: Map<String, Value>,
    },
    /// Provider configuration, `provider.<provider>`.
    Provider {
        /// Provider name.
        provider: String,
        /// Provider settings.
        config: Map<String, Value>,
    },
    /// A module call, `module.<name>`. Every input variable is forwarded.
    Module {
        /// Module name.
        name: String,
        /// Module source path.
        source: String,
    },
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl ResourceDeclaration {
    /// A state backend declaration; non-object `config` is treated as empty.
    #[must_use]
    pub fn backend(backend: impl Into<String>, config: Value) -> Self {
        Self::Backend {
            backend: backend.into(),
            config: object(config),
        }
    }

    /// A provider declaration; non-object `config` is treated as empty.
    #[must_use]
    pub fn provider(provider: impl Into<String>, config: Value) -> Self {
        Self::Provider {
            provider: provider.into(),
            config: object(config),
        }
    }

    /// A module call.
    #[must_use]
    pub fn module(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self::Module {
            name: name.into(),
            source: source.into(),
        }
    }
}

#[derive(Default)]
struct Document {
    backend: Map<String, Value>,
    provider: Map<String, Value>,
    module: Map<String, Value>,
    variable: Map<String, Value>,
}

impl Document {
    fn add(&mut self, declaration: &ResourceDeclaration, variables: &[&str]) {
        match declaration {
            ResourceDeclaration::Backend { backend, config } => {
                self.backend.insert(backend.clone(), Value::Object(config.clone()));
            }
            ResourceDeclaration::Provider { provider, config } => {
                self.provider.insert(provider.clone(), Value::Object(config.clone()));
            }
            ResourceDeclaration::Module { name, source } => {
                let mut body = Map::new();
                body.insert("source".into(), Value::from(source.as_str()));
                for var in variables {
                    body.insert((*var).to_string(), Value::from(format!("${{var.{var}}}")));
                }
                self.module.insert(name.clone(), Value::Object(body));
            }
        }
    }

    fn into_json(self) -> Value {
        let mut document = Map::new();
        if !self.backend.is_empty() {
            let mut terraform = Map::new();
            terraform.insert("backend".into(), Value::Object(self.backend));
            document.insert("terraform".into(), Value::Object(terraform));
        }
        for (name, block) in [("provider", self.provider), ("module", self.module), ("variable", self.variable)] {
            if !block.is_empty() {
                document.insert(name.into(), Value::Object(block));
            }
        }
        Value::Object(document)
    }
}

/// Builds the Terraform JSON document for a stage.
///
/// `variables` are declared as `variable` blocks and forwarded to every module.
#[must_use]
pub fn terraform_document(declarations: &[ResourceDeclaration], variables: &[&str]) -> Value {
    let mut document = Document::default();
    for declaration in declarations {
        document.add(declaration, variables);
    }
    for var in variables {
        document.variable.insert((*var).to_string(), Value::Object(Map::new()));
    }
    document.into_json()
}
