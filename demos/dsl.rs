use ruletree::{
    ActionError, ClearFlag, DataSet, FlagSource, LazySource, RuleSetBuilder, Value,
};

fn main() {
    let rule_set = RuleSetBuilder::from_file("demos/hedge.rules")
        .expect("failed to load rules")
        .action("CreateHedgeOrder", ClearFlag::new("HedgeRequired"))
        .action("FlagForReview", |ds: &DataSet| -> Result<(), ActionError> {
            println!("review {}", ds.name());
            Ok(())
        })
        .compile()
        .expect("failed to compile rules");

    println!("{rule_set}");

    let data_set = DataSet::new("RMSXTest1")
        .with_data_point("OrderStatus", LazySource::new(|| Value::from("WORKING")))
        .and_then(|ds| ds.with_data_point("FilledAmount", LazySource::new(|| Value::from("600"))))
        .and_then(|ds| ds.with_data_point("TotalAmount", LazySource::new(|| Value::from("1000"))))
        .and_then(|ds| ds.with_data_point("Side", LazySource::new(|| Value::from("BUY"))))
        .and_then(|ds| ds.with_data_point("HedgeRequired", FlagSource::new("HedgeRequired", true)))
        .expect("unique data point names");

    let missing = rule_set.missing_data_points(&data_set);
    if !missing.is_empty() {
        println!("missing data points: {missing:?}");
    }

    for pass in 1..=2 {
        let report = rule_set.execute(&data_set);
        println!("pass {pass}: {report}");
    }
}
