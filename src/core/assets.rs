//! Embedded scaffold templates.
//!
//! `specgraph init` writes these into a fresh project so the store is
//! usable immediately: the meta-schema grammar, a starter Product file,
//! and a starter PRD. Baked into the binary for hermetic deployment.

/// Default grammar for the six node kinds. `init` writes this to
/// `substrate/sub_meta_schema.yaml`; projects may edit it afterwards.
pub const META_SCHEMA_TEMPLATE: &str = r#"id: sub_meta_schema
type: substrate
name: SpecGraph Meta Schema
kinds:
  product:
    id_prefix: prod_
    path_pattern: product.yaml
    required: [id, name, version, description, domains]
    optional: [type, vision]
  domain:
    id_prefix: dom_
    path_pattern: product.yaml#domains
    required: [id, name, description]
    optional: [exports]
  feature:
    id_prefix: feat_
    path_pattern: features/feat_*.yaml
    required: [id, domain, source_anchor, intent]
    optional: [type, user_stories, realized_by, depends_on, consumes, workflow]
  component:
    id_prefix: comp_
    path_pattern: components/comp_*.yaml
    required: [id, type, desc, file_path, design]
    optional: [tech_stack, dependencies]
    type_value: module
  design:
    id_prefix: des_
    path_pattern: design/des_*.yaml
    required: [id, type, name, intent]
    optional: [content, references]
    type_value: design
  substrate:
    id_prefix: sub_
    path_pattern: substrate/sub_*.yaml
    required: [id, type, name]
    optional: [content, rules, stack, conventions, kinds]
    type_value: substrate
"#;

pub const PRODUCT_TEMPLATE: &str = r#"id: prod_new_project
name: New Project
version: 0.1.0
description: Describe what this product does and for whom.
vision: One sentence on why this product should exist.
domains:
  - id: dom_core
    name: Core
    description: The primary area of responsibility.
"#;

pub const PRD_TEMPLATE: &str = r#"# Product Vision <!-- id: prod_new_project -->

Describe the product here. Each structural section carries a trailing
anchor comment binding it to a typed node.

## Design Principles

## Domain: Core <!-- id: dom_core -->

### Feature: Example <!-- id: feat_example -->

- Example component <!-- id: comp_example -->
"#;

/// Subdirectories of `.specgraph/` created by `init`.
pub const SPEC_SUBDIRS: [&str; 5] = ["features", "components", "design", "substrate", ".runtime"];
