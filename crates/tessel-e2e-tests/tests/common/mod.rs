use tessel_interp::{ArgValue, Buffer, Interpreter, Memory};
use tessel_lower::{KernelRequest, LowerError, LowerOptions, LoweredKernel, RuleTable, build_kernel};
use tessel_program::{Atom, Aval, DType, GridSpec, Program, ProgramBuilder};

/// Lower a kernel program with the built-in rules.
#[allow(dead_code)]
pub fn lower(program: &Program, operands: &[Aval], grid_spec: &GridSpec) -> LoweredKernel {
    try_lower(program, operands, grid_spec).expect("lowering failed")
}

#[allow(dead_code)]
pub fn try_lower(
    program: &Program,
    operands: &[Aval],
    grid_spec: &GridSpec,
) -> Result<LoweredKernel, LowerError> {
    build_kernel(
        program,
        operands,
        grid_spec,
        "kernel",
        &RuleTable::with_builtins(),
        &LowerOptions::default(),
    )
}

/// Launch `kernel` over its grid with one buffer per argument and return the
/// memory afterwards. Buffer `i` backs argument `i`.
#[allow(dead_code)]
pub fn run_kernel(kernel: &LoweredKernel, buffers: Vec<Buffer>) -> Memory {
    let mut memory = Memory::new();
    let args: Vec<ArgValue> = buffers
        .into_iter()
        .map(|b| ArgValue::Buffer(memory.add(b)))
        .collect();
    let interp = Interpreter::new(&kernel.module).expect("module has no entry point");
    interp
        .launch(&mut memory, &args, &kernel.grid)
        .expect("kernel execution failed");
    memory
}

#[allow(dead_code)]
pub fn f32s(memory: &Memory, id: usize) -> Vec<f32> {
    memory.buffer(id).unwrap().to_f32().unwrap()
}

#[allow(dead_code)]
pub fn ints(memory: &Memory, id: usize) -> Vec<i64> {
    memory.buffer(id).unwrap().to_i64().unwrap()
}

/// Index map over a grid of rank `grid_rank` returning coordinate `axes[i]`
/// for array axis `i`, or block 0 where `axes[i]` is `None`.
#[allow(dead_code)]
pub fn index_map(grid_rank: usize, axes: &[Option<usize>]) -> Program {
    let mut b = ProgramBuilder::new();
    let coords: Vec<Atom> = (0..grid_rank)
        .map(|_| Atom::Var(b.input(Aval::scalar(DType::Int32))))
        .collect();
    let outs = axes
        .iter()
        .map(|axis| match axis {
            Some(a) => coords[*a].clone(),
            None => tessel_program::int32(0),
        })
        .collect();
    b.finish(outs).unwrap()
}

/// Load a demo request by name (without extension).
#[allow(dead_code)]
pub fn load_demo(name: &str) -> KernelRequest {
    let path = format!("{}/../../demos/{name}.json", env!("CARGO_MANIFEST_DIR"));
    let text = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to load {path}: {e}"));
    KernelRequest::from_json(&text).unwrap_or_else(|e| panic!("malformed request {path}: {e}"))
}
