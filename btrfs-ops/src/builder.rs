// SPDX-License-Identifier: GPL-3.0-only

//! Command builder
//!
//! Validates an `OperationRequest` against its schema and renders the
//! argument vector. Values are passed through verbatim as individual
//! arguments; nothing is ever joined into a shell string.

use btrfs_types::{
    BlockDevice, CommandInvocation, OperationRequest, OperationSchema, ParamKind, ParamValue,
    ParameterSpec, device_path_for,
};
use tracing::debug;

use crate::error::{OpsError, Result, Violation};
use crate::registry::Registry;

/// Turns requests into invocations of a fixed program
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    registry: &'static Registry,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new("btrfs")
    }
}

impl CommandBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            registry: Registry::global(),
        }
    }

    pub fn with_registry(mut self, registry: &'static Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Validate `request` and render its argument vector.
    ///
    /// Every violated constraint is reported in a single
    /// `OpsError::Validation`.
    pub fn build(&self, request: OperationRequest) -> Result<CommandInvocation> {
        self.build_checked(request, None)
    }

    /// Like [`build`](Self::build), additionally rejecting device parameters
    /// that do not appear in `known`.
    pub fn build_with_devices(
        &self,
        request: OperationRequest,
        known: &[BlockDevice],
    ) -> Result<CommandInvocation> {
        self.build_checked(request, Some(known))
    }

    fn build_checked(
        &self,
        request: OperationRequest,
        known: Option<&[BlockDevice]>,
    ) -> Result<CommandInvocation> {
        let schema = self.registry.schema_for(request.domain, &request.subcommand)?;
        let mut violations = Vec::new();

        for name in request.params.keys() {
            if schema.param(name).is_none() {
                violations.push(Violation::invalid(name, "unknown parameter"));
            }
        }

        let mut args: Vec<String> = schema.literals.iter().map(|literal| literal.to_string()).collect();
        let mut target = None;

        for spec in &schema.params {
            match render_param(spec, request.params.get(spec.name), known) {
                Ok(tokens) => {
                    if schema.target == Some(spec.name)
                        && let Some(value) = tokens.last()
                    {
                        target = Some(value.clone());
                    }
                    args.extend(tokens);
                }
                Err(violation) => violations.push(violation),
            }
        }

        if !violations.is_empty() {
            debug!(
                "Rejected {} {}: {} violation(s)",
                request.domain,
                request.subcommand,
                violations.len()
            );
            return Err(OpsError::Validation(violations));
        }

        Ok(invocation(&self.program, schema, args, target))
    }
}

fn invocation(
    program: &str,
    schema: &OperationSchema,
    args: Vec<String>,
    target: Option<String>,
) -> CommandInvocation {
    CommandInvocation {
        program: program.to_string(),
        args,
        target,
        exclusive: schema.exclusive,
    }
}

/// Tokens contributed by one parameter, in order
fn render_param(
    spec: &ParameterSpec,
    value: Option<&ParamValue>,
    known: Option<&[BlockDevice]>,
) -> std::result::Result<Vec<String>, Violation> {
    match (spec.kind, value) {
        (ParamKind::Flag, None) | (ParamKind::Flag, Some(ParamValue::Flag(false))) => Ok(Vec::new()),
        (ParamKind::Flag, Some(ParamValue::Flag(true))) => {
            Ok(spec.cli_token.map(ToString::to_string).into_iter().collect())
        }
        (ParamKind::Flag, Some(ParamValue::Text(_))) => {
            Err(Violation::invalid(spec.name, "expected a flag, got a value"))
        }
        (_, Some(ParamValue::Flag(_))) => {
            Err(Violation::invalid(spec.name, "expected a value, got a flag"))
        }
        (kind, Some(ParamValue::Text(raw))) if !raw.trim().is_empty() => {
            let value = check_value(spec.name, kind, raw, known)?;
            let mut tokens = Vec::with_capacity(2);
            if let Some(token) = spec.cli_token {
                tokens.push(token.to_string());
            }
            tokens.push(value);
            Ok(tokens)
        }
        _ if spec.required => Err(Violation::missing(spec.name)),
        _ => Ok(Vec::new()),
    }
}

fn check_value(
    name: &str,
    kind: ParamKind,
    raw: &str,
    known: Option<&[BlockDevice]>,
) -> std::result::Result<String, Violation> {
    if raw.contains('\0') {
        return Err(Violation::invalid(name, "contains a NUL byte"));
    }

    match kind {
        ParamKind::Device => {
            let path = device_path_for(raw);
            if let Some(known) = known
                && !known.iter().any(|device| device.device_path() == path)
            {
                return Err(Violation::invalid(name, format!("{path} is not a known block device")));
            }
            Ok(path)
        }
        _ => Ok(raw.to_string()),
    }
}
