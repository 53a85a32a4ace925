use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ruletree::{
    data_point, ActionError, BooleanFlag, DataPointSource, DataSet, ExprEvaluator, FlagSource,
    LazySource, RuleSetBuilder, Value,
};

fn noop(_: &DataSet) -> Result<(), ActionError> {
    Ok(())
}

/// Data set with `n` true flags `f0..fn` and `n` integer amounts `a0..an`.
fn build_data_set(n: usize) -> DataSet {
    let mut ds = DataSet::new("bench");
    for i in 0..n {
        let flag = format!("f{i}");
        ds.add_data_point(flag.clone(), FlagSource::new(flag, true))
            .unwrap();
        ds.add_data_point(format!("a{i}"), LazySource::new(|| Value::Int(10)))
            .unwrap();
    }
    ds
}

/// A single chain `r0 -> r1 -> ... -> rn` firing one action at the leaf.
fn build_chain(n: usize) -> ruletree::RuleSet {
    let mut builder = RuleSetBuilder::new("chain").action("leaf", noop);
    for i in 0..n {
        let flag = format!("f{i}");
        let parent = (i > 0).then(|| format!("r{}", i - 1));
        builder = builder.rule(&format!("r{i}"), move |r| {
            let r = r.when(BooleanFlag::new(flag));
            let r = match &parent {
                Some(p) => r.under(p),
                None => r,
            };
            if i + 1 == n {
                r.then("leaf")
            } else {
                r
            }
        });
    }
    builder.compile().unwrap()
}

/// One root with `n` expression leaves, each firing an action.
fn build_fan_out(n: usize) -> ruletree::RuleSet {
    let mut builder = RuleSetBuilder::new("fan_out")
        .action("leaf", noop)
        .rule("root", |r| r.when(BooleanFlag::new("f0")));
    for i in 0..n {
        let amount = format!("a{i}");
        builder = builder.rule(&format!("leaf{i}"), move |r| {
            r.under("root")
                .when(ExprEvaluator::new(data_point(&amount).gte(1_i64)))
                .then("leaf")
        });
    }
    builder.compile().unwrap()
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_execute");

    for &n in &[5, 20, 50] {
        let ds = build_data_set(n);

        let chain = build_chain(n);
        group.bench_function(&format!("{n}_chain_cached"), |b| {
            b.iter(|| chain.execute(black_box(&ds)));
        });

        let fan_out = build_fan_out(n);
        group.bench_function(&format!("{n}_fan_out_cached"), |b| {
            b.iter(|| fan_out.execute(black_box(&ds)));
        });

        group.bench_function(&format!("{n}_fan_out_stale"), |b| {
            b.iter(|| {
                for dp in ds.iter() {
                    dp.source().set_stale();
                }
                fan_out.execute(black_box(&ds))
            });
        });
    }

    group.finish();
}

fn bench_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("compilation");

    for &n in &[5, 20, 50] {
        group.bench_function(&format!("{n}_rules"), |b| {
            b.iter(|| black_box(build_chain(n)));
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for &n in &[5, 20, 50] {
        let mut dsl = String::from("ruleset bench\nrule r0:\n    flag(f0)\n");
        for i in 1..n {
            dsl.push_str(&format!(
                "rule r{i} (under r{}):\n    a{i} >= 1 AND NOT f{i} == false\n",
                i - 1
            ));
        }
        group.bench_function(&format!("{n}_rules"), |b| {
            b.iter(|| RuleSetBuilder::from_dsl(black_box(&dsl)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_execute, bench_compilation, bench_parse);
criterion_main!(benches);
