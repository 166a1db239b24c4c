use crate::cli::ScoreArgs;
use crate::config::ProblemFile;
use crate::error::Result;
use rxnalign::core::models::side::Reaction;
use rxnalign::workflows::{self, score::ScoreReport};
use std::io;
use tracing::info;

pub fn run(args: &ScoreArgs) -> Result<()> {
    info!("Loading problem from {:?}", &args.input);
    let problem = ProblemFile::from_file(&args.input)?;
    let reaction = problem.to_reaction()?;
    let matches = problem.match_matrix(&reaction)?;
    let config = problem.scoring_config(args)?;

    let (num_reactants, num_products) = reaction.shape();
    println!(
        "Scoring {} reactant atom(s) in {} group(s) against {} product atom(s) in {} group(s)...",
        num_reactants,
        reaction.reactants.num_groups(),
        num_products,
        reaction.products.num_groups()
    );

    let report = workflows::score::run(&reaction, &matches, &config)?;
    print_summary(&reaction, &report);

    if let Some(output) = &args.output {
        info!("Writing score table to {:?}", output);
        let file = std::fs::File::create(output)?;
        write_scores(file, &report)?;
        println!("Score table written to: {}", output.display());
    }
    Ok(())
}

/// Prints, for every reactant atom, the product atom with the lowest combined score.
fn print_summary(reaction: &Reaction, report: &ScoreReport) {
    let reactants = reaction.reactants.atoms();
    let products = reaction.products.atoms();
    println!("{:>8}  {:>8}  {:>14}", "reactant", "product", "combined");
    for (a, row) in report.combined.row_iter().enumerate() {
        let best = row
            .iter()
            .enumerate()
            .min_by(|(_, x), (_, y)| x.total_cmp(y));
        match best {
            Some((i, score)) => println!(
                "{:>5} {:<2}  {:>5} {:<2}  {:>14.6e}",
                a, reactants[a].element, i, products[i].element, score
            ),
            None => println!("{:>5} {:<2}  {:>8}", a, reactants[a].element, "-"),
        }
    }
}

/// Writes one CSV row per atom pair: indices, the combined score, then every component.
pub fn write_scores<W: io::Write>(writer: W, report: &ScoreReport) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["reactant", "product", "combined"];
    header.extend(report.components.iter().map(|c| c.name));
    csv.write_record(&header)?;

    let (rows, cols) = report.combined.shape();
    for a in 0..rows {
        for i in 0..cols {
            let mut record = vec![
                a.to_string(),
                i.to_string(),
                report.combined[(a, i)].to_string(),
            ];
            record.extend(report.components.iter().map(|c| c.scores[(a, i)].to_string()));
            csv.write_record(&record)?;
        }
    }
    csv.flush()?;
    Ok(())
}
