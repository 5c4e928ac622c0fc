use crate::assembler::Assembler;
use color_print::cformat;

/// Address / encoding / source table followed by the label table.
pub fn print_listing(asm: &Assembler, lines: &[String]) {
    let source = |line: usize| lines.get(line).map(|s| s.trim()).unwrap_or("");

    println!("Address    | Machine Code | Source");
    println!("-----------+--------------+------------------------------------------");
    for inst in &asm.insts {
        println!(
            "{}",
            cformat!(
                "<c>0x{:08X}</> | {:08X}     | {:>4}: {}",
                inst.address,
                inst.word,
                inst.line + 1,
                inst.inst.cformat()
            )
        );
    }
    for data in &asm.data {
        println!(
            "{}",
            cformat!(
                "<c>0x{:08X}</> | <y>{:08X}</>     | {:>4}: {}",
                data.address,
                data.value,
                data.line + 1,
                source(data.line)
            )
        );
    }
    println!("-----------+--------------+------------------------------------------");

    println!("Labels:");
    for (name, label) in asm.labels.iter() {
        let tag = if label.is_data { " (data)" } else { "" };
        println!("{}", cformat!("  <g>{:<24}</> 0x{:08X}{}", name, label.address, tag));
    }
}
