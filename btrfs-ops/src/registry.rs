// SPDX-License-Identifier: GPL-3.0-only

//! Operation schema registry
//!
//! The registry is the only place that knows which subcommands exist per
//! domain and what each parameter means. The builder refuses anything that
//! is not registered here.

use std::collections::HashSet;
use std::sync::LazyLock;

use btrfs_types::MaintenanceDomain::{
    self, Balance, Device, Filesystem, Property, Quota, Rescue, Restore, Scrub, Subvolume,
};
use btrfs_types::{OperationSchema, ParamKind, ParameterSpec};

use crate::error::{OpsError, Result};

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::builtin);

/// Immutable set of operation schemas
#[derive(Debug, Clone)]
pub struct Registry {
    schemas: Vec<OperationSchema>,
}

impl Registry {
    /// Process-wide registry of every supported btrfs operation
    pub fn global() -> &'static Registry {
        &REGISTRY
    }

    pub fn from_schemas(schemas: Vec<OperationSchema>) -> Self {
        Self { schemas }
    }

    pub fn schema_for(&self, domain: MaintenanceDomain, subcommand: &str) -> Result<&OperationSchema> {
        self.schemas
            .iter()
            .find(|schema| schema.domain == domain && schema.subcommand == subcommand)
            .ok_or_else(|| OpsError::unknown(domain, subcommand))
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationSchema> {
        self.schemas.iter()
    }

    pub fn subcommands(&self, domain: MaintenanceDomain) -> Vec<&'static str> {
        self.schemas
            .iter()
            .filter(|schema| schema.domain == domain)
            .map(|schema| schema.subcommand)
            .collect()
    }

    /// Check the schemas for internal consistency.
    ///
    /// Every problem found is reported, not just the first one.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();

        for schema in &self.schemas {
            let id = format!("{}.{}", schema.domain, schema.subcommand);

            if !seen.insert((schema.domain, schema.subcommand)) {
                problems.push(format!("{id}: registered more than once"));
            }

            if schema.literals.is_empty() || schema.literals.iter().any(|literal| literal.is_empty()) {
                problems.push(format!("{id}: literal tokens must be non-empty"));
            }

            let mut names = HashSet::new();
            for param in &schema.params {
                if !names.insert(param.name) {
                    problems.push(format!("{id}: parameter '{}' declared twice", param.name));
                }

                if param.kind == ParamKind::Flag {
                    if param.cli_token.is_none_or(str::is_empty) {
                        problems.push(format!("{id}: flag '{}' has no cli token", param.name));
                    }
                    if param.required {
                        problems.push(format!("{id}: flag '{}' cannot be required", param.name));
                    }
                }
            }

            match schema.target.map(|target| (target, schema.param(target))) {
                Some((target, None)) => {
                    problems.push(format!("{id}: target '{target}' is not a parameter"))
                }
                Some((target, Some(param))) if param.kind == ParamKind::Flag => {
                    problems.push(format!("{id}: target '{target}' is a flag"))
                }
                Some((target, Some(param))) if schema.exclusive && !param.required => {
                    problems.push(format!("{id}: exclusive target '{target}' must be required"))
                }
                None if schema.exclusive && !schema.params.is_empty() => {
                    problems.push(format!("{id}: exclusive operation has no target"))
                }
                _ => {}
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(OpsError::RegistryDrift(problems))
        }
    }

    /// Fail unless every listed operation has a schema
    pub fn ensure_covers(&self, operations: &[(MaintenanceDomain, &str)]) -> Result<()> {
        let missing: Vec<String> = operations
            .iter()
            .filter(|(domain, subcommand)| self.schema_for(*domain, subcommand).is_err())
            .map(|(domain, subcommand)| format!("{domain}.{subcommand}: no schema registered"))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(OpsError::RegistryDrift(missing))
        }
    }

    fn builtin() -> Self {
        use ParamKind::{Device as Dev, Path, Text};

        let device = |required| ParameterSpec::positional("device", Dev, required);
        let path = |name, required| ParameterSpec::positional(name, Path, required);
        let flag = ParameterSpec::flag;

        let schemas = vec![
            // device
            op(Device, "add", vec![flag("force", "-f"), device(true), path("mount", true)])
                .exclusive()
                .target("mount"),
            op(Device, "remove", vec![device(true), path("mount", true)])
                .exclusive()
                .target("mount"),
            op(Device, "scan", vec![device(false)]),
            op(Device, "stats", vec![flag("reset", "-z"), path("target", true)])
                .exclusive()
                .target("target"),
            op(Device, "usage", vec![flag("raw", "-b"), path("mount", true)]).target("mount"),
            // replace lives in its own btrfs command group
            OperationSchema {
                literals: vec!["replace", "start"],
                ..op(
                    Device,
                    "replace",
                    vec![
                        flag("force", "-f"),
                        ParameterSpec::positional("source", Text, true),
                        device(true),
                        path("mount", true),
                    ],
                )
            }
            .foreground()
            .exclusive()
            .target("mount"),
            OperationSchema {
                literals: vec!["replace", "status"],
                ..op(Device, "replace-status", vec![flag("once", "-1"), path("mount", true)])
            }
            .target("mount"),
            OperationSchema {
                literals: vec!["replace", "cancel"],
                ..op(Device, "replace-cancel", vec![path("mount", true)])
            }
            .target("mount"),
            // balance
            op(Balance, "start", vec![flag("full", "--full-balance"), path("path", true)])
                .exclusive()
                .target("path"),
            op(Balance, "pause", vec![path("path", true)]).target("path"),
            op(Balance, "cancel", vec![path("path", true)]).target("path"),
            op(Balance, "resume", vec![path("path", true)])
                .exclusive()
                .target("path"),
            op(Balance, "status", vec![path("path", true)]).target("path"),
            // quota
            op(Quota, "enable", vec![path("path", true)])
                .exclusive()
                .target("path"),
            op(Quota, "disable", vec![path("path", true)])
                .exclusive()
                .target("path"),
            op(Quota, "rescan", vec![flag("wait", "-w"), path("path", true)])
                .exclusive()
                .target("path"),
            // scrub
            op(Scrub, "start", vec![flag("readonly", "-r"), path("target", true)])
                .foreground()
                .exclusive()
                .target("target"),
            op(Scrub, "cancel", vec![path("target", true)]).target("target"),
            op(Scrub, "resume", vec![path("target", true)])
                .foreground()
                .exclusive()
                .target("target"),
            op(Scrub, "status", vec![path("target", true)]).target("target"),
            // filesystem
            op(Filesystem, "df", vec![path("path", true)]).target("path"),
            op(Filesystem, "du", vec![flag("summarize", "-s"), path("path", true)]).target("path"),
            op(Filesystem, "show", vec![path("target", false)]).target("target"),
            op(Filesystem, "sync", vec![path("path", true)])
                .exclusive()
                .target("path"),
            op(Filesystem, "defragment", vec![flag("recursive", "-r"), path("path", true)])
                .exclusive()
                .target("path"),
            op(
                Filesystem,
                "resize",
                vec![ParameterSpec::positional("size", Text, true), path("path", true)],
            )
            .exclusive()
            .target("path"),
            op(
                Filesystem,
                "mkswapfile",
                vec![ParameterSpec::option("size", Text, false, "--size"), path("path", true)],
            )
            .exclusive()
            .target("path"),
            // property
            op(
                Property,
                "get",
                vec![path("object", true), ParameterSpec::positional("name", Text, false)],
            )
            .target("object"),
            op(
                Property,
                "set",
                vec![
                    path("object", true),
                    ParameterSpec::positional("name", Text, true),
                    ParameterSpec::positional("value", Text, true),
                ],
            )
            .exclusive()
            .target("object"),
            op(Property, "list", vec![path("object", true)]).target("object"),
            // rescue
            op(Rescue, "chunk-recover", vec![device(true)])
                .exclusive()
                .target("device"),
            op(Rescue, "super-recover", vec![device(true)])
                .exclusive()
                .target("device"),
            op(Rescue, "zero-log", vec![device(true)])
                .exclusive()
                .target("device"),
            op(Rescue, "fix-device-size", vec![device(true)])
                .exclusive()
                .target("device"),
            op(Rescue, "create-control-device", vec![]),
            op(Rescue, "clear-ino-cache", vec![device(true)])
                .exclusive()
                .target("device"),
            op(
                Rescue,
                "clear-space-cache",
                vec![ParameterSpec::positional("version", Text, true), device(true)],
            )
            .exclusive()
            .target("device"),
            op(Rescue, "clear-uuid-tree", vec![]),
            // subvolume
            op(Subvolume, "create", vec![path("path", true)])
                .exclusive()
                .target("path"),
            op(Subvolume, "delete", vec![path("path", true)])
                .exclusive()
                .target("path"),
            op(Subvolume, "list", vec![path("path", true)]).target("path"),
            op(
                Subvolume,
                "snapshot",
                vec![flag("readonly", "-r"), path("source", true), path("dest", true)],
            )
            .exclusive()
            .target("source"),
            // restore has no subcommand token of its own
            OperationSchema {
                domain: Restore,
                subcommand: "restore",
                literals: vec!["restore"],
                params: vec![
                    flag("dry_run", "-D"),
                    flag("ignore_errors", "-i"),
                    flag("overwrite", "-o"),
                    flag("metadata", "-m"),
                    flag("symlinks", "-S"),
                    flag("snapshots", "-s"),
                    device(true),
                    path("path", true),
                ],
                exclusive: true,
                target: Some("device"),
            },
        ];

        Self { schemas }
    }
}

fn op(domain: MaintenanceDomain, subcommand: &'static str, params: Vec<ParameterSpec>) -> OperationSchema {
    OperationSchema {
        domain,
        subcommand,
        literals: vec![domain.as_str(), subcommand],
        params,
        exclusive: false,
        target: None,
    }
}

trait SchemaExt {
    fn exclusive(self) -> Self;
    fn target(self, name: &'static str) -> Self;
    fn foreground(self) -> Self;
}

impl SchemaExt for OperationSchema {
    /// Keep the job in the foreground (`-B`) so the invocation, and the
    /// target lock held for it, lasts as long as the job itself
    fn foreground(mut self) -> Self {
        self.literals.push("-B");
        self
    }

    fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    fn target(mut self, name: &'static str) -> Self {
        self.target = Some(name);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_consistent() {
        Registry::global().validate().expect("builtin registry must validate");
    }

    #[test]
    fn every_domain_has_operations() {
        for domain in MaintenanceDomain::ALL {
            assert!(
                !Registry::global().subcommands(domain).is_empty(),
                "{domain} has no subcommands"
            );
        }
    }

    #[test]
    fn subvolume_create_requires_path() {
        let schema = Registry::global()
            .schema_for(Subvolume, "create")
            .expect("subvolume create registered");
        assert_eq!(schema.literals, vec!["subvolume", "create"]);
        let required: Vec<_> = schema.required_params().map(|param| param.name).collect();
        assert_eq!(required, vec!["path"]);
        assert!(schema.exclusive);
    }

    #[test]
    fn unregistered_pairs_are_unknown() {
        let error = Registry::global().schema_for(Balance, "defragment").unwrap_err();
        assert!(matches!(error, OpsError::UnknownOperation { .. }));
    }

    #[test]
    fn status_and_cancel_do_not_lock() {
        for (domain, subcommand) in [
            (Balance, "status"),
            (Balance, "cancel"),
            (Balance, "pause"),
            (Scrub, "status"),
            (Scrub, "cancel"),
        ] {
            let schema = Registry::global().schema_for(domain, subcommand).unwrap();
            assert!(!schema.exclusive, "{domain}.{subcommand} must not lock");
        }
    }

    #[test]
    fn background_capable_jobs_run_in_foreground() {
        for (domain, subcommand, literals) in [
            (Scrub, "start", vec!["scrub", "start", "-B"]),
            (Scrub, "resume", vec!["scrub", "resume", "-B"]),
            (Device, "replace", vec!["replace", "start", "-B"]),
        ] {
            let schema = Registry::global().schema_for(domain, subcommand).unwrap();
            assert_eq!(schema.literals, literals);
            assert!(schema.exclusive);
        }

        for subcommand in ["status", "cancel"] {
            let schema = Registry::global().schema_for(Scrub, subcommand).unwrap();
            assert!(!schema.literals.contains(&"-B"));
        }
    }

    #[test]
    fn replace_status_and_cancel_do_not_lock() {
        for (subcommand, literals) in [
            ("replace-status", vec!["replace", "status"]),
            ("replace-cancel", vec!["replace", "cancel"]),
        ] {
            let schema = Registry::global().schema_for(Device, subcommand).unwrap();
            assert_eq!(schema.literals, literals);
            assert!(!schema.exclusive);
            assert_eq!(schema.target, Some("mount"));
        }
    }

    #[test]
    fn exclusive_operations_require_their_target() {
        let restore = Registry::global().schema_for(Restore, "restore").unwrap();
        let required: Vec<_> = restore.required_params().map(|param| param.name).collect();
        assert_eq!(required, vec!["device", "path"]);

        let broken = Registry::from_schemas(vec![
            op(Quota, "enable", vec![path_param("path", false)])
                .exclusive()
                .target("path"),
            op(Quota, "disable", vec![path_param("path", true)]).exclusive(),
        ]);
        let OpsError::RegistryDrift(problems) = broken.validate().unwrap_err() else {
            panic!("expected registry drift");
        };
        assert_eq!(problems.len(), 2);
    }

    fn path_param(name: &'static str, required: bool) -> ParameterSpec {
        ParameterSpec::positional(name, ParamKind::Path, required)
    }

    #[test]
    fn rescue_device_less_operations_have_no_params() {
        for subcommand in ["create-control-device", "clear-uuid-tree"] {
            let schema = Registry::global().schema_for(Rescue, subcommand).unwrap();
            assert!(schema.params.is_empty());
            assert_eq!(schema.target, None);
        }
    }

    #[test]
    fn validate_reports_every_problem() {
        let broken = Registry::from_schemas(vec![
            op(Quota, "enable", vec![]).target("path"),
            op(Quota, "enable", vec![]),
            op(
                Quota,
                "rescan",
                vec![ParameterSpec {
                    name: "wait",
                    kind: ParamKind::Flag,
                    required: false,
                    cli_token: None,
                }],
            ),
        ]);

        let OpsError::RegistryDrift(problems) = broken.validate().unwrap_err() else {
            panic!("expected registry drift");
        };
        assert_eq!(problems.len(), 3);
    }

    #[test]
    fn ensure_covers_lists_missing_operations() {
        let registry = Registry::global();
        registry
            .ensure_covers(&[(Scrub, "start"), (Restore, "restore")])
            .expect("registered operations are covered");

        let OpsError::RegistryDrift(missing) = registry
            .ensure_covers(&[(Device, "swap"), (Quota, "enable"), (Scrub, "limit")])
            .unwrap_err()
        else {
            panic!("expected registry drift");
        };
        assert_eq!(missing.len(), 2);
    }
}
