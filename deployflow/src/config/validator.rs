//! Semantic validation for a parsed platform configuration.

use super::types::{AccessLevel, CertificateKind, PlatformConfig};
use crate::errors::ConfigError;

const MAX_PROJECT_NAME_LEN: usize = 32;

fn validate_project_name(name: &str, errors: &mut Vec<String>) {
    if name.trim().is_empty() {
        errors.push("project_name must not be empty".to_string());
        return;
    }
    if name.len() > MAX_PROJECT_NAME_LEN {
        errors.push(format!(
            "project_name '{name}' is longer than {MAX_PROJECT_NAME_LEN} characters"
        ));
    }
    let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    let starts_alpha = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !valid_chars || !starts_alpha {
        errors.push(format!(
            "project_name '{name}' must start with a letter and contain only letters, digits, '-' or '_'"
        ));
    }
}

fn validate_image(field: &str, image: &str, errors: &mut Vec<String>) {
    match image.rsplit_once(':') {
        Some((name, tag)) if !name.is_empty() && !tag.is_empty() && !tag.contains('/') => {}
        _ => errors.push(format!("{field}: image '{image}' must have the form name:tag")),
    }
}

/// Validates a parsed platform configuration.
///
/// Returns `Ok(())` if valid, or a [`ConfigError`] listing every problem.
///
/// # Errors
///
/// Returns an error when any rule is violated.
pub fn validate_config(config: &PlatformConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_project_name(&config.project_name, &mut errors);

    if config.namespace.trim().is_empty() {
        errors.push("namespace must not be empty".to_string());
    }

    let defaults = config.profiles.jupyterlab.iter().filter(|p| p.default).count();
    if defaults > 1 {
        errors.push(format!(
            "profiles.jupyterlab: at most one profile may be default, found {defaults}"
        ));
    }

    for (i, profile) in config.profiles.jupyterlab.iter().enumerate() {
        let restricted = profile.users.is_some() || profile.groups.is_some();
        if restricted && profile.access != AccessLevel::Yaml {
            errors.push(format!(
                "profiles.jupyterlab[{i}] '{}': users/groups may only be set when access is 'yaml'",
                profile.display_name
            ));
        }
    }

    if config.certificate.kind == CertificateKind::Existing && config.certificate.secret_name.is_none() {
        errors.push("certificate.secret_name is required when certificate type is 'existing'".to_string());
    }

    validate_image("default_images.jupyterhub", &config.default_images.jupyterhub, &mut errors);
    validate_image("default_images.jupyterlab", &config.default_images.jupyterlab, &mut errors);
    validate_image("default_images.dask_worker", &config.default_images.dask_worker, &mut errors);

    for (i, ext) in config.tf_extensions.iter().enumerate() {
        if ext.urlslug.trim().is_empty() {
            errors.push(format!("tf_extensions[{i}] '{}': urlslug must not be empty", ext.name));
        }
    }

    if config.health_check.attempts == 0 {
        errors.push("health_check.attempts must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::from_messages(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{JupyterLabProfile, TerraformExtension};

    fn valid() -> PlatformConfig {
        PlatformConfig::new("demo")
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_empty_project_name() {
        let err = validate_config(&PlatformConfig::default()).unwrap_err();
        assert!(err.messages.iter().any(|m| m.contains("project_name must not be empty")));
    }

    #[test]
    fn test_project_name_charset() {
        let err = validate_config(&PlatformConfig::new("1bad name")).unwrap_err();
        assert_eq!(err.messages.len(), 1);
        assert!(err.messages[0].contains("must start with a letter"));
    }

    #[test]
    fn test_multiple_default_profiles() {
        let mut config = valid();
        for p in &mut config.profiles.jupyterlab {
            p.default = true;
        }
        let err = validate_config(&config).unwrap_err();
        assert!(err.messages[0].contains("at most one profile may be default"));
    }

    #[test]
    fn test_users_require_yaml_access() {
        let mut config = valid();
        config.profiles.jupyterlab.push(JupyterLabProfile {
            access: AccessLevel::All,
            display_name: "GPU".into(),
            description: "gpu".into(),
            default: false,
            users: Some(vec!["alice".into()]),
            groups: None,
            kubespawner_override: None,
        });
        let err = validate_config(&config).unwrap_err();
        assert!(err.messages[0].contains("'GPU'"));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = PlatformConfig::default();
        config.certificate.kind = CertificateKind::Existing;
        config.default_images.jupyterlab = "no-tag".into();
        config.health_check.attempts = 0;
        config.tf_extensions.push(TerraformExtension {
            name: "ext".into(),
            urlslug: String::new(),
            logout: String::new(),
        });
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.messages.len(), 5);
    }

    #[test]
    fn test_registry_port_in_image_name() {
        let mut config = valid();
        config.default_images.jupyterhub = "localhost:5000/hub".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.messages[0].starts_with("default_images.jupyterhub"));

        config.default_images.jupyterhub = "localhost:5000/hub:1.0".into();
        assert!(validate_config(&config).is_ok());
    }
}
