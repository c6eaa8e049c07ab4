use migra_engine::{MigrationConfig, MigrationPlan, PlannedTarget, TargetDescriptor};
use migra_test_utils::{addr, avalanche, memory_store, open_runner, sim_chain, PlanMigration};
use proptest::prelude::*;

fn plan_of(aliased: Vec<bool>) -> MigrationPlan {
    let mut plan = MigrationPlan::new();
    for (i, alias) in aliased.into_iter().enumerate() {
        let role = format!("c{i}");
        let target = TargetDescriptor::clone_of(role.clone(), addr(i as u8 + 1), avalanche());
        let target = if alias { target.aliased() } else { target };
        plan.push(PlannedTarget::fixed(role, target));
    }
    plan
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Re-preparing deploys exactly the unaliased targets again
    #[test]
    fn prop_prepare_is_idempotent_for_aliased(
        aliased in prop::collection::vec(any::<bool>(), 1..8),
        force in any::<bool>(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let chain = sim_chain();
        for i in 0..aliased.len() {
            chain.publish_remote(avalanche(), addr(i as u8 + 1), &format!("C{i}"));
        }
        let unaliased = aliased.iter().filter(|a| !**a).count();
        let total = aliased.len();

        let flags = aliased.clone();
        let migration = PlanMigration::new("prop", move || plan_of(flags.clone()));
        let config = MigrationConfig::new().with_force_redeploy(force);
        let mut runner = open_runner(config, memory_store(), &chain);

        let (first, second) = rt.block_on(async {
            let first = runner.prepare(&migration).await.unwrap();
            let second = runner.prepare(&migration).await.unwrap();
            (first, second)
        });

        let expected = if force { 2 * total } else { total + unaliased };
        prop_assert_eq!(chain.deploy_count(), expected);

        for (i, alias) in aliased.iter().enumerate() {
            let role = format!("c{i}");
            let same = first.address(&role).unwrap() == second.address(&role).unwrap();
            prop_assert_eq!(same, *alias && !force);
        }
    }
}
