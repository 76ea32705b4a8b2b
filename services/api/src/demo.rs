use crate::infra::in_memory_engine;
use chrono::Utc;
use clap::Args;
use exam_admin::assignments::{NewTest, StudentRegistration};
use exam_admin::error::AppError;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Institute name used for the walkthrough
    #[arg(long)]
    pub(crate) institute: Option<String>,
    /// How many students register before the institute-wide assignment
    #[arg(long)]
    pub(crate) seed_students: Option<usize>,
}

const DEMO_NAMES: [&str; 4] = ["Priya Sharma", "Rahul Mehta", "Ananya Iyer", "Vikram Rao"];

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        institute,
        seed_students,
    } = args;

    let institute_name =
        institute.unwrap_or_else(|| "Aurora Institute of Technology".to_string());
    let seed_students = seed_students.unwrap_or(2).max(1);

    println!(
        "Assignment propagation demo ({})",
        Utc::now().format("%Y-%m-%d")
    );

    let engine = in_memory_engine();

    let created = engine.create_institute(&institute_name)?;
    let institute = created.institute().clone();
    println!(
        "- Institute '{}' {}",
        institute.display_name,
        created.label()
    );

    println!("\nRegistering {seed_students} student(s) before any assignment exists");
    for index in 1..=seed_students {
        let registered = engine.register_student(&demo_registration(index, &institute_name))?;
        println!(
            "  - {} registered ({} backfilled test(s))",
            registered.student.full_name,
            registered.backfilled_tests.len()
        );
    }

    let algebra = engine.create_test(&demo_test(
        "Algebra Fundamentals",
        "Linear equations, polynomials, and factorization",
    ))?;
    let physics = engine.create_test(&demo_test(
        "Physics Mock Test 1",
        "Kinematics and Newton's laws",
    ))?;
    println!("\nCreated tests '{}' and '{}'", algebra.title, physics.title);

    let outcome = engine.assign_test_to_institute(institute.id, algebra.id)?;
    println!("\nInstitute-wide assignment of '{}':", algebra.title);
    println!("  {}", outcome.summary());

    let late_index = seed_students + 1;
    let late = engine.register_student(&demo_registration(late_index, &institute_name))?;
    println!(
        "- {} registered afterwards and was backfilled {} test(s)",
        late.student.full_name,
        late.backfilled_tests.len()
    );

    let assigned = engine.assign_test_to_students(physics.id, &[late.student.id])?;
    println!(
        "- Direct assignment of '{}' reached {} student(s)",
        physics.title, assigned
    );

    let resolved: Vec<i64> = engine
        .resolve_tests_for_institute(&institute_name)?
        .into_iter()
        .map(|id| id.0)
        .collect();
    println!("- Institute currently resolves to test id(s) {resolved:?}");

    println!("\nTests held by {}:", late.student.full_name);
    for view in engine.tests_for_student(&demo_identity(late_index))? {
        println!(
            "  - {} (assigned {})",
            view.title,
            view.assigned_at.format("%Y-%m-%d %H:%M")
        );
    }

    let removal = engine.unassign_test_from_institute(institute.id, algebra.id)?;
    println!(
        "\nUnassigned '{}' from the institute: removed {} student row(s)",
        algebra.title, removal.students_removed
    );

    if let Some(entry) = engine.institute_overview()?.into_iter().next() {
        match serde_json::to_string_pretty(&entry) {
            Ok(json) => println!("\nInstitute overview payload:\n{json}"),
            Err(err) => println!("\nInstitute overview unavailable: {err}"),
        }
    }

    Ok(())
}

fn demo_identity(index: usize) -> String {
    format!("demo-student-{index}")
}

fn demo_registration(index: usize, institute: &str) -> StudentRegistration {
    StudentRegistration {
        external_identity: demo_identity(index),
        full_name: DEMO_NAMES[(index - 1) % DEMO_NAMES.len()].to_string(),
        email: format!("demo-student-{index}@example.edu"),
        roll_number: format!("R-{:03}", 100 + index),
        institute_name: institute.to_string(),
    }
}

fn demo_test(title: &str, description: &str) -> NewTest {
    NewTest {
        title: title.to_string(),
        description: description.to_string(),
    }
}
