use prost::Message;

use upf_bridge::catalog;
use upf_bridge::wire::{self, proto};

#[test]
fn problems_survive_the_wire() {
    for (name, example) in catalog::examples().unwrap() {
        let bytes = wire::problem_to_bytes(&example.problem);
        let decoded = wire::problem_from_bytes(&bytes).unwrap_or_else(|e| panic!("{}: {}", name, e));
        assert_eq!(decoded, example.problem, "{}", name);
        // encoding is a function of the problem alone
        assert_eq!(wire::problem_to_bytes(&decoded), bytes, "{}", name);
    }
}

#[test]
fn plans_survive_the_wire() {
    for (name, example) in catalog::examples().unwrap() {
        let bytes = wire::plan_to_bytes(&example.plan);
        let unresolved = wire::plan_from_bytes(&bytes).unwrap_or_else(|e| panic!("{}: {}", name, e));
        assert_eq!(unresolved.len(), example.plan.len(), "{}", name);
        let plan = unresolved.resolve(&example.problem).unwrap_or_else(|e| panic!("{}: {}", name, e));
        assert_eq!(plan, example.plan, "{}", name);
        assert_eq!(wire::plan_to_bytes(&plan), bytes, "{}", name);
    }
}

#[test]
fn plans_resolve_against_a_decoded_problem() {
    for (name, example) in catalog::examples().unwrap() {
        let problem = wire::problem_from_bytes(&wire::problem_to_bytes(&example.problem)).unwrap();
        let plan = wire::plan_from_bytes(&wire::plan_to_bytes(&example.plan)).unwrap().resolve(&problem).unwrap();
        for (instance, original) in plan.instances().into_iter().zip(example.plan.instances()) {
            assert_eq!(instance.to_string(), original.to_string(), "{}", name);
            assert!(problem.actions().iter().any(|a| std::sync::Arc::ptr_eq(a, instance.action())), "{}", name);
        }
    }
}

#[test]
fn plan_for_the_wrong_problem_does_not_resolve() {
    let examples = catalog::examples().unwrap();
    let loader = &examples["robot_loader"];
    let basic = &examples["basic"];
    let unresolved = wire::plan_from_bytes(&wire::plan_to_bytes(&loader.plan)).unwrap();
    assert!(unresolved.resolve(&basic.problem).is_err());
}

#[test]
fn truncated_bytes_are_rejected() {
    let example = catalog::matchcellar().unwrap();
    let bytes = proto::ProblemMessage::encode_to_vec(&wire::encode_problem(&example.problem));
    assert!(wire::problem_from_bytes(&bytes[..bytes.len() / 2]).is_err());
}
