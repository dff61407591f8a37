//! Integration tests for TOML patch files
//!
//! Tests loading, validation, and applying patch files against a workspace

use anchor_patcher::config::{
    apply_patches, check_patches, load_from_path, load_from_str, ApplicationError, ConfigError,
};
use anchor_patcher::{LineCondition, LinePredicate, PatchError, PatchOutcome, Placement, RunMode};
use std::fs;
use tempfile::TempDir;

const ROUTES: &str = "import { Router } from 'express';\n\
const router = Router();\n\
\n\
router.get('/orders', listOrders);\n\
\n\
// Webhooks\n\
router.post('/webhook', webhookHandler);\n\
\n\
export default router;\n";

/// Helper to create a temp workspace with a routes file
fn setup_test_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src/routes")).unwrap();
    fs::write(dir.path().join("src/routes/order.routes.ts"), ROUTES).unwrap();
    dir
}

const ROUTE_PATCH: &str = r#"
[meta]
name = "order-routes"
description = "Register the cancel-payment route"

[[patches]]
id = "cancel-payment-route"
file = "src/routes/order.routes.ts"

[[patches.anchor]]
equals = "router.get('/orders', listOrders);"

[[patches.anchor]]
offset = 2
contains = "Webhooks"

[patches.insert]
text = "router.post('/:orderId/cancel-payment', cancelPaymentHandler);"
"#;

#[test]
fn test_load_patch_config_basic() {
    let config = load_from_str(ROUTE_PATCH).expect("Failed to parse config");

    assert_eq!(config.meta.name, "order-routes");
    assert_eq!(config.patches.len(), 1);

    let patch = &config.patches[0];
    assert_eq!(patch.id, "cancel-payment-route");
    assert_eq!(patch.placement, Placement::After);
    assert!(patch.skip_if_present);

    let pattern = patch.anchor_pattern().unwrap();
    assert_eq!(
        pattern.conditions(),
        &[
            LineCondition::new(
                0,
                LinePredicate::Equals("router.get('/orders', listOrders);".into())
            ),
            LineCondition::new(2, LinePredicate::Contains("Webhooks".into())),
        ]
    );
}

#[test]
fn test_load_placement_and_blank() {
    let toml = r#"
[[patches]]
id = "p"
file = "a.ts"
placement = "before"
skip_if_present = false

[[patches.anchor]]
offset = -1
blank = true

[[patches.anchor]]
starts_with = "export default"

[patches.insert]
path = "blocks/p.ts"
"#;
    let config = load_from_str(toml).unwrap();
    let patch = &config.patches[0];

    assert_eq!(patch.placement, Placement::Before);
    assert!(!patch.skip_if_present);
    assert_eq!(
        patch.anchor_pattern().unwrap().conditions()[0],
        LineCondition::new(-1, LinePredicate::Blank)
    );
}

#[test]
fn test_validation_collects_all_issues() {
    let toml = r#"
[[patches]]
id = ""
file = ""

[[patches.anchor]]
equals = "};"
contains = "x"

[patches.insert]
text = "a"
path = "b.ts"
"#;
    let err = load_from_str(toml).unwrap_err();
    let ConfigError::Validation { source, .. } = &err else {
        panic!("expected validation error, got {err}");
    };
    // id, file, predicate combo, insert combo
    assert_eq!(source.issues.len(), 4);
}

#[test]
fn test_validation_rejects_missing_anchor_and_block() {
    let toml = r#"
[[patches]]
id = "bare"
file = "a.ts"
"#;
    let err = load_from_str(toml).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("'anchor'"));
    assert!(message.contains("'insert.text'"));
}

#[test]
fn test_empty_config_rejected() {
    let err = load_from_str("[meta]\nname = \"empty\"\n").unwrap_err();
    assert!(err.to_string().contains("no patches"));
}

#[test]
fn test_unknown_condition_field_rejected() {
    let toml = r#"
[[patches]]
id = "p"
file = "a.ts"

[[patches.anchor]]
regex = ".*"

[patches.insert]
text = "x"
"#;
    assert!(matches!(
        load_from_str(toml),
        Err(ConfigError::Toml { .. })
    ));
}

#[test]
fn test_load_from_path_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[[patches]]\nid = \n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn test_apply_and_reapply() {
    let workspace = setup_test_workspace();
    let config = load_from_str(ROUTE_PATCH).unwrap();
    let target = workspace.path().join("src/routes/order.routes.ts");

    let results = apply_patches(&config, workspace.path(), RunMode::Apply);
    assert_eq!(results.len(), 1);
    let (id, result) = &results[0];
    assert_eq!(id, "cancel-payment-route");
    assert!(matches!(
        result,
        Ok(PatchOutcome::Inserted {
            line: 5,
            written: true,
            ..
        })
    ));

    let patched = fs::read_to_string(&target).unwrap();
    assert!(patched.contains(
        "router.get('/orders', listOrders);\nrouter.post('/:orderId/cancel-payment', cancelPaymentHandler);\n\n// Webhooks\n"
    ));

    let results = apply_patches(&config, workspace.path(), RunMode::Apply);
    assert!(matches!(
        results[0].1,
        Ok(PatchOutcome::AlreadyApplied { line: 5, .. })
    ));
    assert_eq!(fs::read_to_string(&target).unwrap(), patched);
}

#[test]
fn test_apply_stops_at_first_failure() {
    let workspace = setup_test_workspace();
    let toml = r#"
[[patches]]
id = "missing-anchor"
file = "src/routes/order.routes.ts"

[[patches.anchor]]
contains = "no such line"

[patches.insert]
text = "// never"

[[patches]]
id = "would-work"
file = "src/routes/order.routes.ts"

[[patches.anchor]]
equals = "export default router;"

[patches.insert]
text = "// trailer"
"#;
    let config = load_from_str(toml).unwrap();

    let results = apply_patches(&config, workspace.path(), RunMode::Apply);
    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0].1,
        Err(ApplicationError::Patch(PatchError::AnchorNotFound { .. }))
    ));
    assert_eq!(
        fs::read_to_string(workspace.path().join("src/routes/order.routes.ts")).unwrap(),
        ROUTES
    );
}

#[test]
fn test_check_evaluates_every_patch_without_writing() {
    let workspace = setup_test_workspace();
    let toml = r#"
[[patches]]
id = "missing-anchor"
file = "src/routes/order.routes.ts"

[[patches.anchor]]
contains = "no such line"

[patches.insert]
text = "// never"

[[patches]]
id = "trailer"
file = "src/routes/order.routes.ts"

[[patches.anchor]]
equals = "export default router;"

[patches.insert]
text = "// trailer"
"#;
    let config = load_from_str(toml).unwrap();

    let results = check_patches(&config, workspace.path());
    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_err());
    assert!(matches!(
        results[1].1,
        Ok(PatchOutcome::Inserted {
            line: 10,
            written: false,
            ..
        })
    ));
    assert_eq!(
        fs::read_to_string(workspace.path().join("src/routes/order.routes.ts")).unwrap(),
        ROUTES
    );
}

#[test]
fn test_insert_path_relative_to_patch_file() {
    let workspace = setup_test_workspace();
    let patches_dir = workspace.path().join("patches");
    fs::create_dir_all(patches_dir.join("blocks")).unwrap();
    fs::write(
        patches_dir.join("blocks/trailer.ts"),
        "// generated trailer\n",
    )
    .unwrap();
    fs::write(
        patches_dir.join("trailer.toml"),
        r#"
[[patches]]
id = "trailer"
file = "src/routes/order.routes.ts"

[[patches.anchor]]
equals = "export default router;"

[patches.insert]
path = "blocks/trailer.ts"
"#,
    )
    .unwrap();

    let config = load_from_path(patches_dir.join("trailer.toml")).unwrap();
    let results = apply_patches(&config, workspace.path(), RunMode::Apply);
    assert!(results[0].1.is_ok());

    let patched =
        fs::read_to_string(workspace.path().join("src/routes/order.routes.ts")).unwrap();
    assert!(patched.ends_with("export default router;\n// generated trailer\n"));
}

#[test]
fn test_missing_block_file() {
    let workspace = setup_test_workspace();
    let toml = r#"
[[patches]]
id = "p"
file = "src/routes/order.routes.ts"

[[patches.anchor]]
equals = "export default router;"

[patches.insert]
path = "does/not/exist.ts"
"#;
    let config = load_from_str(toml).unwrap();
    let results = apply_patches(&config, workspace.path(), RunMode::Apply);
    assert!(matches!(
        results[0].1,
        Err(ApplicationError::InsertSource { .. })
    ));
}

#[test]
fn test_empty_block_file_is_rejected() {
    let workspace = setup_test_workspace();
    let target = workspace.path().join("src/routes/order.routes.ts");
    let original = fs::read_to_string(&target).unwrap();
    let patches_dir = workspace.path().join("patches");
    fs::create_dir_all(&patches_dir).unwrap();
    fs::write(patches_dir.join("empty.ts"), "\n\n").unwrap();
    fs::write(
        patches_dir.join("empty.toml"),
        r#"
[[patches]]
id = "empty"
file = "src/routes/order.routes.ts"

[[patches.anchor]]
equals = "export default router;"

[patches.insert]
path = "empty.ts"
"#,
    )
    .unwrap();

    let config = load_from_path(patches_dir.join("empty.toml")).unwrap();
    let results = apply_patches(&config, workspace.path(), RunMode::Apply);
    assert!(matches!(
        results[0].1,
        Err(ApplicationError::Patch(PatchError::EmptyBlock { .. }))
    ));
    assert_eq!(fs::read_to_string(&target).unwrap(), original);
}

#[test]
fn test_bundled_order_controller_patch() {
    let patch_file =
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("patches/order-controller.toml");
    let config = load_from_path(&patch_file).unwrap();

    let workspace = TempDir::new().unwrap();
    let controllers = workspace.path().join("src/controllers");
    fs::create_dir_all(&controllers).unwrap();
    let target = controllers.join("order.controller.ts");
    fs::write(
        &target,
        r#"export const verifyPaymentHandler = async () => {
  next();
};

/**
 * Razorpay webhook handler
 * POST /api/orders/webhook
 */
export const webhookHandler = async () => {};
"#,
    )
    .unwrap();

    let results = apply_patches(&config, workspace.path(), RunMode::Apply);
    assert!(matches!(
        results[0].1,
        Ok(PatchOutcome::Inserted { line: 4, .. })
    ));

    let patched = fs::read_to_string(&target).unwrap();
    assert!(patched.contains("};\n\n/**\n * Cancel payment"));
    assert!(patched.contains("export const cancelPaymentHandler"));
    assert!(patched.contains("};\n\n/**\n * Razorpay webhook handler"));
}
