//! End-to-end scenarios, one per test: a linear chain, a diamond, a cycle,
//! a section with two candidates, two independent parallel failures, and
//! an abort racing a slow task. Each scenario gets its own task types so
//! the macro-populated descriptor registry never collides between tests,
//! and its own order log since `cargo test` runs these concurrently in one
//! process.

use std::sync::Mutex;

use pretty_assertions::assert_eq;

use taski::{task, Args, Described, Executor, SectionBody, TaskBody, TaskContext, TaskResult, TaskiError};

// --- scenario 1: linear chain --------------------------------------------

static LINEAR_ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

#[derive(Default)]
struct LinearA;

#[task(exports = ["name"])]
impl TaskBody for LinearA {
    fn run(&self, _ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        LINEAR_ORDER.lock().unwrap().push("A");
        let mut out = taski::Exports::new();
        out.set("name", "A".to_string());
        Ok(out)
    }
}

#[derive(Default)]
struct LinearB;

#[task(exports = ["a_from_a"])]
impl TaskBody for LinearB {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        LINEAR_ORDER.lock().unwrap().push("B");
        let a_from_a = ctx.dep::<LinearA>()?.get::<String>("name").unwrap();
        let mut out = taski::Exports::new();
        out.set("a_from_a", (*a_from_a).clone());
        Ok(out)
    }
}

#[derive(Default)]
struct LinearC;

#[task(exports = ["msg"])]
impl TaskBody for LinearC {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        LINEAR_ORDER.lock().unwrap().push("C");
        let a_from_a = ctx.dep::<LinearB>()?.get::<String>("a_from_a").unwrap();
        let mut out = taski::Exports::new();
        out.set("msg", format!("{a_from_a}/b"));
        Ok(out)
    }
}

#[test]
fn linear_chain_runs_in_dependency_order_and_forwards_values() {
    let executor = Executor::new(Vec::new());
    executor.execute(LinearC::descriptor(), Args::new()).unwrap();

    assert_eq!(*LINEAR_ORDER.lock().unwrap(), vec!["A", "B", "C"]);

    let exports = executor
        .registry()
        .get_or_create(LinearC::descriptor())
        .exports_snapshot();
    assert_eq!(exports.get::<String>("msg").unwrap(), "A/b");
}

// --- scenario 2: diamond --------------------------------------------------

static DIAMOND_ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());
static DIAMOND_A_RUNS: Mutex<u32> = Mutex::new(0);

#[derive(Default)]
struct DiamondA;

#[task]
impl TaskBody for DiamondA {
    fn run(&self, _ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        DIAMOND_ORDER.lock().unwrap().push("A");
        *DIAMOND_A_RUNS.lock().unwrap() += 1;
        Ok(taski::Exports::new())
    }
}

#[derive(Default)]
struct DiamondB;

#[task]
impl TaskBody for DiamondB {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        ctx.dep::<DiamondA>()?;
        DIAMOND_ORDER.lock().unwrap().push("B");
        Ok(taski::Exports::new())
    }
}

#[derive(Default)]
struct DiamondC;

#[task]
impl TaskBody for DiamondC {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        ctx.dep::<DiamondA>()?;
        DIAMOND_ORDER.lock().unwrap().push("C");
        Ok(taski::Exports::new())
    }
}

#[derive(Default)]
struct DiamondD;

#[task]
impl TaskBody for DiamondD {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        ctx.dep::<DiamondB>()?;
        ctx.dep::<DiamondC>()?;
        DIAMOND_ORDER.lock().unwrap().push("D");
        Ok(taski::Exports::new())
    }
}

#[test]
fn diamond_runs_shared_ancestor_exactly_once_before_both_branches() {
    let executor = Executor::new(Vec::new());
    executor.execute(DiamondD::descriptor(), Args::new()).unwrap();

    assert_eq!(*DIAMOND_A_RUNS.lock().unwrap(), 1);

    let order = DIAMOND_ORDER.lock().unwrap();
    let pos = |name: &str| order.iter().position(|&n| n == name).unwrap();
    assert!(pos("A") < pos("B"));
    assert!(pos("A") < pos("C"));
    assert!(pos("B") < pos("D"));
    assert!(pos("C") < pos("D"));
}

// --- scenario 3: cycle -----------------------------------------------------

static CYCLE_RUNS: Mutex<u32> = Mutex::new(0);

#[derive(Default)]
struct CycleX;

#[task]
impl TaskBody for CycleX {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        *CYCLE_RUNS.lock().unwrap() += 1;
        ctx.dep::<CycleY>()?;
        Ok(taski::Exports::new())
    }
}

#[derive(Default)]
struct CycleY;

#[task]
impl TaskBody for CycleY {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        *CYCLE_RUNS.lock().unwrap() += 1;
        ctx.dep::<CycleX>()?;
        Ok(taski::Exports::new())
    }
}

#[test]
fn cycle_is_rejected_before_any_task_runs() {
    let executor = Executor::new(Vec::new());
    let err = executor.execute(CycleX::descriptor(), Args::new()).unwrap_err();

    let TaskiError::Cycle(cycle) = err else {
        panic!("expected a cycle error, got {err:?}");
    };
    let names: Vec<&str> = cycle.sccs.iter().flatten().map(|t| t.name).collect();
    assert!(names.contains(&"CycleX"));
    assert!(names.contains(&"CycleY"));

    assert_eq!(*CYCLE_RUNS.lock().unwrap(), 0);
}

// --- scenario 4: section ---------------------------------------------------

#[derive(Default)]
struct SectionP;

#[task(exports = ["x"])]
impl TaskBody for SectionP {
    fn run(&self, _ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        let mut out = taski::Exports::new();
        out.set("x", "P-value".to_string());
        Ok(out)
    }
}

#[derive(Default)]
struct SectionQ;

#[task(exports = ["x"])]
impl TaskBody for SectionQ {
    fn run(&self, _ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        let mut out = taski::Exports::new();
        out.set("x", "Q-value".to_string());
        Ok(out)
    }
}

#[derive(Default)]
struct SectionS;

#[taski::section(candidates = [SectionP, SectionQ])]
impl SectionBody for SectionS {
    fn select(&self, _ctx: &TaskContext<'_>) -> TaskResult<&'static taski::TaskClass> {
        Ok(SectionP::descriptor())
    }
}

#[derive(Default)]
struct SectionMain;

#[task(exports = ["x"])]
impl TaskBody for SectionMain {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        let x = ctx.dep::<SectionS>()?.get::<String>("x").unwrap();
        let mut out = taski::Exports::new();
        out.set("x", (*x).clone());
        Ok(out)
    }
}

#[test]
fn section_runs_only_the_selected_candidate_and_skips_the_rest() {
    let executor = Executor::new(Vec::new());
    executor.execute(SectionMain::descriptor(), Args::new()).unwrap();

    let registry = executor.registry();
    assert_eq!(
        registry.get_or_create(SectionP::descriptor()).run_state(),
        taski::task::TaskState::Completed
    );
    assert_eq!(
        registry.get_or_create(SectionQ::descriptor()).run_state(),
        taski::task::TaskState::Skipped
    );

    let exports = registry.get_or_create(SectionMain::descriptor()).exports_snapshot();
    assert_eq!(exports.get::<String>("x").unwrap(), "P-value");
}

// --- scenario 5: parallel failure ------------------------------------------

#[derive(Default)]
struct ParallelF1;

#[task]
impl TaskBody for ParallelF1 {
    fn run(&self, _ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        Err("E1".into())
    }
}

#[derive(Default)]
struct ParallelF2;

#[task]
impl TaskBody for ParallelF2 {
    fn run(&self, _ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        Err("E2".into())
    }
}

#[derive(Default)]
struct ParallelRoot;

#[task]
impl TaskBody for ParallelRoot {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        ctx.dep::<ParallelF1>()?;
        ctx.dep::<ParallelF2>()?;
        Ok(taski::Exports::new())
    }
}

#[test]
fn independent_failures_are_collected_into_one_aggregate() {
    let executor = Executor::new(Vec::new());
    let err = executor.execute(ParallelRoot::descriptor(), Args::new()).unwrap_err();

    let TaskiError::Aggregate(aggregate) = err else {
        panic!("expected an aggregate error, got {err:?}");
    };
    assert_eq!(aggregate.failures.len(), 2);
    assert!(aggregate.contains_task(ParallelF1::descriptor()));
    assert!(aggregate.contains_task(ParallelF2::descriptor()));
}

// --- scenario 6: abort ------------------------------------------------------

static SLOW_FINISHED: Mutex<bool> = Mutex::new(false);

#[derive(Default)]
struct AbortSlow;

#[task]
impl TaskBody for AbortSlow {
    fn run(&self, _ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        std::thread::sleep(std::time::Duration::from_millis(50));
        *SLOW_FINISHED.lock().unwrap() = true;
        Ok(taski::Exports::new())
    }
}

#[derive(Default)]
struct AbortCrit;

#[task]
impl TaskBody for AbortCrit {
    fn run(&self, _ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        Err(Box::new(taski::Abort::new("critical failure")))
    }
}

#[derive(Default)]
struct AbortRoot;

#[task]
impl TaskBody for AbortRoot {
    fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<taski::Exports> {
        ctx.dep::<AbortSlow>()?;
        ctx.dep::<AbortCrit>()?;
        Ok(taski::Exports::new())
    }
}

#[test]
fn abort_lets_running_tasks_finish_but_starts_nothing_new() {
    let executor = Executor::new(Vec::new());
    let err = executor.execute(AbortRoot::descriptor(), Args::new()).unwrap_err();

    let TaskiError::Abort(abort) = err else {
        panic!("expected an abort, got {err:?}");
    };
    assert_eq!(abort.task_class.name, "AbortCrit");
    assert!(
        *SLOW_FINISHED.lock().unwrap(),
        "Slow must be allowed to finish once started"
    );

    let registry = executor.registry();
    assert_eq!(
        registry.get_or_create(AbortRoot::descriptor()).run_state(),
        taski::task::TaskState::Pending
    );
}
