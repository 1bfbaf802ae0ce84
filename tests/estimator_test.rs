use asset_ledger::estimator::{Decision, EstimateInput, estimate};

fn input(age: f64, original: f64, repair: f64, replace: f64, lifespan: f64) -> EstimateInput {
    EstimateInput::new(age, original, repair, replace, lifespan, false)
}

#[test]
fn costly_repair_means_replace() {
    println!("\n====== Testing repair share rule ======");
    let result = estimate(&input(8.0, 1000.0, 600.0, 1000.0, 10.0));

    assert_eq!(result.recommendation, Decision::Replace);
    assert_eq!(result.confidence, 60);
    assert_eq!(result.repair_percentage, 60.0);
    assert_eq!(result.depreciation, 80);
    assert_eq!(result.current_value, 200);
    assert_eq!(result.remaining_life, 2.0);
    assert_eq!(result.repair_tco, 690);
    assert_eq!(result.replace_tco, 1250);
    assert_eq!(result.savings_amount, 560);
    assert_eq!(result.energy_savings, 0);
    println!("✓ 60% repair share recommends REPLACE at 60% confidence");
}

#[test]
fn heavy_depreciation_means_replace() {
    let result = estimate(&input(9.0, 1000.0, 100.0, 1000.0, 10.0));
    assert_eq!(result.recommendation, Decision::Replace);
    assert_eq!(result.confidence, 70);
}

#[test]
fn confidence_is_capped() {
    let result = estimate(&input(12.0, 1000.0, 100.0, 1000.0, 10.0));
    assert_eq!(result.recommendation, Decision::Replace);
    assert_eq!(result.confidence, 95);
    assert_eq!(result.remaining_life, 0.0);
    assert_eq!(result.current_value, -200);

    let result = estimate(&input(1.0, 1000.0, 2000.0, 1000.0, 10.0));
    assert_eq!(result.confidence, 95);
}

#[test]
fn short_remaining_life_means_replace() {
    let result = estimate(&input(1.5, 1000.0, 100.0, 1000.0, 3.0));
    assert_eq!(result.recommendation, Decision::Replace);
    assert_eq!(result.confidence, 85);
    assert_eq!(result.remaining_life, 1.5);
}

#[test]
fn cheap_repair_on_young_asset_means_repair() {
    let result = estimate(&input(2.0, 1000.0, 200.0, 1000.0, 10.0));
    assert_eq!(result.recommendation, Decision::Repair);
    assert_eq!(result.confidence, 70);
    assert_eq!(result.depreciation, 20);
    println!("✓ 20% repair on a 20% depreciated asset recommends REPAIR");
}

#[test]
fn half_way_confidence_rounds_up() {
    let result = estimate(&input(2.0, 1000.0, 125.0, 1000.0, 10.0));
    assert_eq!(result.recommendation, Decision::Repair);
    assert_eq!(result.repair_percentage, 12.5);
    assert_eq!(result.confidence, 78);
}

#[test]
fn energy_savings_override_repair() {
    println!("\n====== Testing energy override ======");
    let result = estimate(&EstimateInput::new(2.0, 1000.0, 300.0, 1000.0, 10.0, true));
    assert_eq!(result.recommendation, Decision::Replace);
    assert_eq!(result.confidence, 80);
    assert_eq!(result.energy_savings, 1000);
    assert_eq!(result.replace_tco, 250);
    println!("✓ Five-year energy savings above twice the repair flip to REPLACE");

    // Savings equal to twice the repair do not trigger the override
    let result = estimate(&EstimateInput::new(2.0, 1000.0, 500.0, 1000.0, 10.0, true));
    assert_eq!(result.recommendation, Decision::Repair);
    assert_eq!(result.confidence, 40);
}

#[test]
fn energy_override_keeps_higher_confidence() {
    let result = estimate(&EstimateInput::new(11.0, 1000.0, 100.0, 1000.0, 10.0, true));
    assert_eq!(result.recommendation, Decision::Replace);
    assert_eq!(result.confidence, 90);
}

#[test]
fn missing_lifespan_falls_back_to_ten_years() {
    let result = estimate(&input(5.0, 1000.0, 100.0, 1000.0, 0.0));
    assert_eq!(result.depreciation, 50);
    assert_eq!(result.remaining_life, 5.0);
    assert_eq!(result.recommendation, Decision::Repair);
    assert_eq!(result.confidence, 80);
}

#[test]
fn zero_replace_cost_gives_zero_repair_share() {
    let result = estimate(&input(2.0, 1000.0, 100.0, 0.0, 10.0));
    assert_eq!(result.repair_percentage, 0.0);
    assert_eq!(result.recommendation, Decision::Repair);
    assert_eq!(result.confidence, 90);
}

#[test]
fn repair_cost_is_built_from_parts_and_labor() {
    let result = estimate(&EstimateInput {
        asset_age: 2.0,
        original_cost: 1000.0,
        replace_cost: 1000.0,
        lifespan: 10.0,
        parts_cost: 100.0,
        labor_hours: 2.0,
        ..Default::default()
    });
    assert_eq!(result.labor_rate, 80.0);
    assert_eq!(result.labor_rate_label, "Day Rate - $80/hour");
    assert_eq!(result.labor_cost, 160.0);
    assert_eq!(result.repair_cost, 260.0);
    assert_eq!(result.repair_percentage, 26.0);
    assert_eq!(result.confidence, 64);
}

#[test]
fn non_finite_inputs_count_as_zero() {
    let result = estimate(&input(f64::NAN, f64::INFINITY, 100.0, 1000.0, 10.0));
    assert_eq!(result.depreciation, 0);
    assert_eq!(result.current_value, 0);
    assert_eq!(result.recommendation, Decision::Repair);
}

#[test]
fn form_values_are_read_leniently() {
    let raw = r#"{
        "assetAge": "8",
        "originalCost": 1000,
        "repairCost": "600",
        "replaceCost": "1000.00",
        "lifespan": "10 years",
        "energyEfficiency": false,
        "laborRate": "abc"
    }"#;
    let parsed: EstimateInput = serde_json::from_str(raw).unwrap();
    assert_eq!(parsed.lifespan, 10.0);
    assert_eq!(parsed.labor_rate, 0.0);

    let result = estimate(&parsed);
    assert_eq!(result.recommendation, Decision::Replace);
    assert_eq!(result.confidence, 60);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["recommendation"], "REPLACE");
    assert_eq!(json["repairPercentage"], 60.0);
    assert_eq!(json["savingsAmount"], 560);
}

#[test]
fn checkbox_values_set_energy_efficiency() {
    println!("\n====== Testing energy checkbox parsing ======");
    for raw in [r#""on""#, r#""true""#, r#""Yes""#, "1", "true"] {
        let body = format!(r#"{{"replaceCost": 1000, "energyEfficiency": {}}}"#, raw);
        let parsed: EstimateInput = serde_json::from_str(&body).unwrap();
        assert!(parsed.energy_efficiency, "{} should read as checked", raw);
    }
    println!("✓ Form checkbox values read as checked");

    for raw in [r#""off""#, r#""""#, "0", "false", "null"] {
        let body = format!(r#"{{"replaceCost": 1000, "energyEfficiency": {}}}"#, raw);
        let parsed: EstimateInput = serde_json::from_str(&body).unwrap();
        assert!(!parsed.energy_efficiency, "{} should read as unchecked", raw);
    }

    let parsed: EstimateInput = serde_json::from_str(
        r#"{"assetAge": "2", "originalCost": "1000", "repairCost": "300", "replaceCost": "1000", "lifespan": "10", "energyEfficiency": "on"}"#,
    )
    .unwrap();
    let result = estimate(&parsed);
    assert_eq!(result.recommendation, Decision::Replace);
    assert_eq!(result.confidence, 80);
    println!("✓ Checked box from a form triggers the energy override");
}
