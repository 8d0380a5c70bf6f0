use acsets_core::{DeletionPolicy, PartId, Value};
use acsets_petri::MiraNet;
use anyhow::Result;
use colored::Colorize;

fn species_label(net: &MiraNet, s: PartId) -> Result<String> {
    Ok(net.species_name(s)?.unwrap_or("?").to_string())
}

fn side(net: &MiraNet, species: &[PartId]) -> Result<String> {
    if species.is_empty() {
        return Ok("∅".to_string());
    }
    let labels = species
        .iter()
        .map(|&s| species_label(net, s))
        .collect::<Result<Vec<_>>>()?;
    Ok(labels.join(" + "))
}

pub fn print_net(net: &MiraNet, policy: DeletionPolicy) -> Result<()> {
    let h = net.handles();
    let acset = net.acset();

    println!(
        "{} {} (policy: {})",
        "MiraNet".green().bold(),
        "SIR".cyan(),
        policy
    );

    println!("  {}", "Species".bold());
    for s in net.species()? {
        let initial = acset
            .get_attr(h.mira_initial_value, s)?
            .and_then(Value::as_float)
            .map(|x| format!("  initial={x}"))
            .unwrap_or_default();
        println!("    {:>3} {}{}", s.raw(), species_label(net, s)?.yellow(), initial);
    }

    println!("  {}", "Transitions".bold());
    for t in net.transitions()? {
        let name = net.transition_name(t)?.unwrap_or("?");
        let lhs = side(net, &net.input_species(t)?)?;
        let rhs = side(net, &net.output_species(t)?)?;
        let rate = acset
            .get_attr(h.mira_rate_law, t)?
            .and_then(Value::as_text)
            .map(|r| format!("  rate={r}"))
            .unwrap_or_default();
        println!("    {:>3} {}: {} -> {}{}", t.raw(), name.yellow(), lhs, rhs, rate);
    }

    let observables = net.observables()?.count();
    println!("  {} {}", "Observables:".bold(), observables);
    Ok(())
}
