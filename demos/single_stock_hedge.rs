use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ruletree::{
    ActionError, ActionExecutor, ClearFlag, DataSet, Dispatcher, DispatcherConfig, Field,
    FieldSource, FlagSource, RuleSetBuilder,
};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const BROKER: &str = "BB";

const RULES: &str = r#"
ruleset SingleStockHedge

rule StatusWorking:
    equals(OrderStatus, "WORKING")

rule Filled50Percent (under StatusWorking):
    percentage(FilledAmount, TotalAmount, 50)

rule HedgeRequired (under Filled50Percent):
    flag(HedgeRequired)
    then CreateHedgeOrder
"#;

/// Upstream order fields, as an order-management client would expose them.
struct Order {
    order_no: Arc<Field>,
    status: Arc<Field>,
    filled: Arc<Field>,
    total: Arc<Field>,
}

impl Order {
    fn new(id: &str, order_no: i64, total: i64) -> Self {
        Self {
            order_no: Arc::new(Field::new(id, "OrderNo", order_no)),
            status: Arc::new(Field::new(id, "OrderStatus", "NEW")),
            filled: Arc::new(Field::new(id, "FilledAmount", "0")),
            total: Arc::new(Field::new(id, "TotalAmount", total.to_string())),
        }
    }

    fn data_set(&self, id: &str) -> Result<DataSet, ruletree::BuildError> {
        DataSet::new(id)
            .with_data_point("OrderNo", FieldSource::new(Arc::clone(&self.order_no) as _))?
            .with_data_point("OrderStatus", FieldSource::new(Arc::clone(&self.status) as _))?
            .with_data_point("FilledAmount", FieldSource::new(Arc::clone(&self.filled) as _))?
            .with_data_point("TotalAmount", FieldSource::new(Arc::clone(&self.total) as _))?
            .with_data_point("HedgeRequired", FlagSource::new("HedgeRequired", true))
    }
}

fn create_hedge_order(data_set: &DataSet) -> Result<(), ActionError> {
    let order_no = data_set.value("OrderNo")?;
    let filled = data_set.value("FilledAmount")?;
    info!(order = data_set.name(), %order_no, broker = BROKER, %filled, "creating hedge order");
    ClearFlag::new("HedgeRequired").execute(data_set)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();

    let rules = Arc::new(
        RuleSetBuilder::from_dsl(RULES)?
            .action("CreateHedgeOrder", create_hedge_order)
            .compile()?,
    );
    print!("{}", rules.report());

    let mut dispatcher = Dispatcher::spawn_observed(
        Arc::clone(&rules),
        DispatcherConfig::default(),
        |report| println!("{report}"),
    )?;
    let events = dispatcher.sender();

    let id = "RMSXTest1";
    let order = Order::new(id, 1, 1000);
    events.track(Arc::new(order.data_set(id)?))?;

    // Simulated upstream activity: the order goes live and fills in steps.
    events.field_changed(order.status.set("WORKING"))?;
    for filled in [200, 400, 500, 700, 1000] {
        thread::sleep(Duration::from_millis(50));
        events.field_changed(order.filled.set(filled.to_string()))?;
    }
    events.field_changed(order.status.set("FILLED"))?;

    thread::sleep(Duration::from_millis(100));
    dispatcher.stop();
    rules.stop();
    Ok(())
}
