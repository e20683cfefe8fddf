//! 配置校验模块
//!
//! 校验规则：
//! - batch.capacity > 0
//! - batch.interval > 0
//! - workers.count > 0
//! - endpoint.timeout > 0
//! - command name 非空

use std::time::Duration;

use contracts::{AgentConfig, ContractError};

/// 校验 AgentConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &AgentConfig) -> Result<(), ContractError> {
    validate_batch(config)?;
    validate_workers(config)?;
    validate_endpoint(config)?;
    validate_commands(config)?;
    Ok(())
}

/// 校验批处理参数
fn validate_batch(config: &AgentConfig) -> Result<(), ContractError> {
    if config.batch.capacity == 0 {
        return Err(ContractError::config_validation(
            "batch.capacity",
            "capacity must be > 0",
        ));
    }
    if config.batch.interval == Duration::ZERO {
        return Err(ContractError::config_validation(
            "batch.interval",
            "interval must be > 0",
        ));
    }
    Ok(())
}

/// 校验 worker 数量
fn validate_workers(config: &AgentConfig) -> Result<(), ContractError> {
    if config.workers.count == 0 {
        return Err(ContractError::config_validation(
            "workers.count",
            "at least one submitter worker is required",
        ));
    }
    Ok(())
}

/// 校验 HTTP 超时
fn validate_endpoint(config: &AgentConfig) -> Result<(), ContractError> {
    if config.endpoint.timeout == Duration::ZERO {
        return Err(ContractError::config_validation(
            "endpoint.timeout",
            "timeout must be > 0",
        ));
    }
    Ok(())
}

/// 校验命令列表
fn validate_commands(config: &AgentConfig) -> Result<(), ContractError> {
    for (idx, command) in config.commands.iter().enumerate() {
        if command.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("commands[{}].name", idx),
                "command name cannot be empty",
            ));
        }
    }
    Ok(())
}
