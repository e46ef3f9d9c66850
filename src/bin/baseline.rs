// src/bin/baseline.rs
//
// Monte-Carlo harness for the classical 1/e cutoff rule.
//
// Reports the empirical success rate and its variance over random
// scenarios; the reference point a trained policy has to beat. Flag parsing
// is hand-rolled to keep the harness self-contained.
//
// Run examples:
//   cargo run --bin baseline -- --len 50 --num 10000
//   cargo run --bin baseline -- --len 200 --num 100000 --seed 7

use std::env;
use std::process;

use optistop::baseline::cutoff_rule_success;

const DEFAULT_LEN: usize = 50;
const DEFAULT_NUM: usize = 10_000;
const DEFAULT_SEED: u64 = 1;

#[derive(Debug, Clone, Copy)]
struct Args {
    len: usize,
    num: usize,
    seed: u64,
}

impl Args {
    fn usage() -> &'static str {
        "\
optistop cutoff-rule baseline

USAGE:
  cargo run --bin baseline -- [FLAGS]

FLAGS:
  --len N     Number of candidates per trial (default: 50)
  --num N     Number of trials (default: 10000)
  --seed U64  RNG seed (default: 1)
  --help      Show this help
"
    }

    fn parse() -> Result<Args, String> {
        let mut args = Args {
            len: DEFAULT_LEN,
            num: DEFAULT_NUM,
            seed: DEFAULT_SEED,
        };
        let mut it = env::args().skip(1);
        while let Some(flag) = it.next() {
            match flag.as_str() {
                "--help" | "-h" => {
                    print!("{}", Self::usage());
                    process::exit(0);
                }
                "--len" => args.len = parse_next(&mut it, "--len")?,
                "--num" => args.num = parse_next(&mut it, "--num")?,
                "--seed" => args.seed = parse_next(&mut it, "--seed")?,
                other => return Err(format!("unknown flag: {other}")),
            }
        }
        if args.len == 0 {
            return Err("--len must be positive".to_string());
        }
        if args.num == 0 {
            return Err("--num must be positive".to_string());
        }
        Ok(args)
    }
}

fn parse_next<T: std::str::FromStr>(
    it: &mut impl Iterator<Item = String>,
    flag: &str,
) -> Result<T, String> {
    let value = it.next().ok_or_else(|| format!("{flag} needs a value"))?;
    value
        .parse()
        .map_err(|_| format!("{flag}: invalid value {value:?}"))
}

fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("error: {msg}\n\n{}", Args::usage());
            process::exit(2);
        }
    };

    let report = cutoff_rule_success(args.len, args.num, args.seed);
    println!(
        "cutoff rule | len={} trials={} seed={}",
        report.horizon, report.trials, args.seed
    );
    println!("Success rate:  {:.5}", report.success_rate);
    println!("Rate variance: {:.5}", report.variance);
}
