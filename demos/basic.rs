use ruletree::{
    data_point, ActionError, BooleanFlag, DataSet, ExprEvaluator, FlagSource, LazySource,
    PercentageThreshold, Rule, RuleAction, RuleSet, StringEquals, Value,
};

fn main() {
    // Build the tree directly, without the name-based builder
    let hedge = Rule::new("HedgeRequired", BooleanFlag::new("HedgeRequired")).with_action(
        RuleAction::new("CreateHedgeOrder", |ds: &DataSet| -> Result<(), ActionError> {
            println!("hedging {}", ds.name());
            Ok(())
        }),
    );
    let large = Rule::new(
        "LargeOrder",
        ExprEvaluator::new(data_point("TotalAmount").gte(1000_i64)),
    );
    let root = Rule::new("StatusWorking", StringEquals::new("OrderStatus", "WORKING"))
        .with_rule(Rule::new("Filled50Percent", PercentageThreshold::new(50.0)).with_rule(hedge))
        .with_rule(large);
    let rule_set = RuleSet::new("SingleStockHedge").with_rule(root);

    println!("{rule_set}");
    print!("{}", rule_set.report());

    let data_set = DataSet::new("RMSXTest1")
        .with_data_point("OrderStatus", LazySource::new(|| Value::from("WORKING")))
        .and_then(|ds| ds.with_data_point("FilledAmount", LazySource::new(|| Value::Int(600))))
        .and_then(|ds| ds.with_data_point("TotalAmount", LazySource::new(|| Value::Int(1000))))
        .and_then(|ds| ds.with_data_point("HedgeRequired", FlagSource::new("HedgeRequired", true)))
        .expect("unique data point names");

    println!("{}", data_set.report());
    let report = rule_set.execute(&data_set);
    println!("{report}");
    for path in report.evaluation_order() {
        println!("  evaluated {path}");
    }
}
