use ctxnet::buf::NetBuf;

use crate::cmd::VarintArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{hex, print_varints, OutputFormat, VarintRow};

pub fn run(args: VarintArgs, format: OutputFormat) -> CliResult<i32> {
    let rows: Vec<VarintRow> = args.values.iter().map(|&value| encode(value)).collect();
    print_varints(&rows, format);
    Ok(SUCCESS)
}

fn encode(value: i32) -> VarintRow {
    let mut compact = NetBuf::new();
    compact.write_var_i32(value);
    let mut passthrough = NetBuf::passthrough();
    passthrough.write_var_i32(value);
    VarintRow {
        value,
        compact: hex(compact.as_slice()),
        passthrough: hex(passthrough.as_slice()),
    }
}
