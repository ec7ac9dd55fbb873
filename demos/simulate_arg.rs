use coalescent_arg::*;

fn simulate_pair(
    params: &ArgParameters,
) -> Result<(TableCollection, EventCounter), Box<dyn std::error::Error>> {
    let mut counter = EventCounter::default();
    let resolved = simulate_with_observer(params, Encoding::Resolved, &mut counter)?;
    let unresolved = simulate_with_observer(params, Encoding::Unresolved, &mut NoopObserver)?;
    let converted = convert_unresolved(&unresolved)?;
    assert_eq!(converted, resolved);
    Ok((resolved, counter))
}

pub fn main() {
    let params = ArgParameters::new(100, 1e-3, 10000).with_seed(213512);
    match simulate_pair(&params) {
        Ok((tables, counter)) => println!(
            "{} {} {} {}",
            tables.nodes().len(),
            tables.edges().len(),
            counter.recombinations,
            counter.coalescences
        ),
        Err(e) => eprintln!("{e}"),
    }
}
