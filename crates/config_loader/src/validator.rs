//! 配置校验模块
//!
//! 校验规则：
//! - profile 名称非空，仅含字母、数字、`-`、`_`
//! - ScanConfig 自身约束 (见 `ScanConfig::check`)，字段路径加 `scan.` 前缀

use contracts::{ContractError, ScanProfile};
use validator::Validate;

/// 校验 ScanProfile
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(profile: &ScanProfile) -> Result<(), ContractError> {
    validate_name(profile)?;
    profile.scan.check().map_err(|e| prefix_field(e, "scan"))?;
    Ok(())
}

fn validate_name(profile: &ScanProfile) -> Result<(), ContractError> {
    profile
        .validate()
        .map_err(|e| ContractError::config_validation("name", e.to_string()))?;

    let valid = profile
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ContractError::config_validation(
            "name",
            format!("'{}' may only contain letters, digits, '-' and '_'", profile.name),
        ));
    }
    Ok(())
}

fn prefix_field(err: ContractError, prefix: &str) -> ContractError {
    match err {
        ContractError::ConfigValidation { field, message } => {
            ContractError::config_validation(format!("{prefix}.{field}"), message)
        }
        other => other,
    }
}
