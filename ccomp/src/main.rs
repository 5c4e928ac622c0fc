use ccomp::error::Failure;
use color_print::ceprintln;
use std::process::ExitCode;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input C source file
    input: String,

    /// Output assembly file
    #[clap(short, long, default_value = "output.s")]
    output: String,

    /// Echo the generated assembly
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    use clap::Parser;

    let args: Args = Args::parse();
    println!("Compiling '{}' to '{}'...", args.input, args.output);

    let source = match std::fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(err) => {
            ceprintln!("<red,bold>error</>: {}", Failure::Io(args.input.clone(), err));
            return ExitCode::FAILURE;
        }
    };

    match run(&args, &source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            failure.print(&args.input, &source);
            ExitCode::FAILURE
        }
    }
}

/// Every stage must pass before the output file is touched.
fn run(args: &Args, source: &str) -> Result<(), Failure> {
    let tokens = ccomp::lex(source)?;
    println!("Lexical analysis: {} tokens", tokens.len());

    let mut ast = ccomp::parse(tokens)?;
    println!("Parsing: AST generated");

    ccomp::check(&mut ast)?;
    println!("Type checking: passed");

    let asm = ccomp::generate(&ast, &args.input)?;
    println!("Code generation: completed successfully");

    if args.verbose {
        print!("{}", asm);
    }

    std::fs::write(&args.output, &asm).map_err(|err| Failure::Io(args.output.clone(), err))?;
    println!("  > {}", args.output);
    Ok(())
}
