use indoc::indoc;
use stackable_rbac::{
    ClusterRoleConfig, ClusterRoleReconciler, Error, Existence, ManagedObject, Reconciler,
    RoleBindingConfig, RoleBindingReconciler, RoleConfig, RoleReconciler,
    patch::operation_path,
    store::{Failure, InMemoryStore, Verb},
};

fn pod_reader() -> RoleConfig {
    RoleConfig::from_yaml_str(indoc! {"
        metadata:
          name: pod-reader
          namespace: default
        rule:
          - resources: [pods]
            verbs: [get, list]
    "})
    .unwrap()
}

fn read_pods() -> RoleBindingConfig {
    RoleBindingConfig::from_yaml_str(indoc! {"
        metadata:
          name: read-pods
          namespace: default
          labels:
            app.kubernetes.io/managed-by: rbac-sync
        role_ref:
          api_group: rbac.authorization.k8s.io
          kind: Role
          name: pod-reader
        subject:
          - kind: User
            name: jane
            api_group: rbac.authorization.k8s.io
    "})
    .unwrap()
}

fn patch_paths(store: &InMemoryStore) -> Vec<Vec<String>> {
    store
        .patches()
        .iter()
        .map(|patch| {
            patch
                .0
                .iter()
                .map(|operation| operation_path(operation).to_owned())
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn role_lifecycle() {
    let reconciler = RoleReconciler::new(InMemoryStore::new());

    let identifier = reconciler.create(&pod_reader()).await.unwrap();
    assert_eq!(identifier, "default/pod-reader");

    let read = reconciler.read(&identifier).await.unwrap();
    assert_eq!(read.rules, pod_reader().rules);
    assert_eq!(read, pod_reader());

    reconciler.delete(&identifier).await.unwrap();
    assert!(matches!(
        reconciler.exists(&identifier).await,
        Existence::NotFound
    ));
}

#[tokio::test]
async fn update_touches_only_changed_fields() {
    let reconciler = RoleReconciler::new(InMemoryStore::new());
    let identifier = reconciler.create(&pod_reader()).await.unwrap();

    let mut watching = pod_reader();
    watching.rules[0].verbs.push("watch".to_owned());
    reconciler
        .update(&identifier, &pod_reader(), &watching)
        .await
        .unwrap();

    let mut annotated = watching.clone();
    annotated.metadata = annotated
        .metadata
        .with_annotation("rbac.stackable.tech/owner", "platform-team");
    reconciler
        .update(&identifier, &watching, &annotated)
        .await
        .unwrap();

    assert_eq!(
        patch_paths(reconciler.store()),
        [vec!["/rules"], vec!["/metadata/annotations"]]
    );
    assert_eq!(reconciler.read(&identifier).await.unwrap(), annotated);
}

#[tokio::test]
async fn label_changes_are_patched_per_key() {
    let reconciler = RoleBindingReconciler::new(InMemoryStore::new());
    let identifier = reconciler.create(&read_pods()).await.unwrap();

    let mut relabeled = read_pods();
    relabeled.metadata.labels.clear();
    relabeled.metadata = relabeled
        .metadata
        .with_label("app.kubernetes.io/name", "web")
        .with_label("app.kubernetes.io/managed-by", "operator");
    reconciler
        .update(&identifier, &read_pods(), &relabeled)
        .await
        .unwrap();

    assert_eq!(
        patch_paths(reconciler.store()),
        [[
            "/metadata/labels/app.kubernetes.io~1managed-by",
            "/metadata/labels/app.kubernetes.io~1name",
        ]]
    );
    assert_eq!(reconciler.read(&identifier).await.unwrap(), relabeled);
}

#[tokio::test]
async fn role_ref_change_requires_replacement() {
    let reconciler = RoleBindingReconciler::new(InMemoryStore::new());
    let identifier = reconciler.create(&read_pods()).await.unwrap();

    let mut rebound = read_pods();
    rebound.role_ref.kind = "ClusterRole".to_owned();
    rebound.role_ref.name = "view".to_owned();

    let result = reconciler.update(&identifier, &read_pods(), &rebound).await;
    assert!(matches!(result, Err(Error::Immutable { .. })));
    assert!(reconciler.store().patches().is_empty());

    reconciler.delete(&identifier).await.unwrap();
    let identifier = reconciler.create(&rebound).await.unwrap();
    assert_eq!(reconciler.read(&identifier).await.unwrap(), rebound);
}

#[tokio::test]
async fn ambiguous_probe_is_reported() {
    let store = InMemoryStore::new();
    let reconciler = RoleReconciler::new(store.clone());

    store.inject_failure(Failure::rejected(401, "Unauthorized"));
    let existence = reconciler.exists("default/pod-reader").await;

    assert!(matches!(
        existence,
        Existence::ProbeError(Error::RemoteRejected { code: 401, .. })
    ));
    assert!(existence.assume_exists());
}

#[tokio::test]
async fn kinds_share_a_store() {
    let store = InMemoryStore::new();
    let roles = RoleReconciler::new(store.clone());
    let cluster_roles = ClusterRoleReconciler::new(store.clone());

    let mut cluster_role = ClusterRoleConfig {
        metadata: pod_reader().metadata,
        rules: pod_reader().rules,
    };
    cluster_role.metadata.namespace = None;

    roles.create(&pod_reader()).await.unwrap();
    let identifier = cluster_roles.create(&cluster_role).await.unwrap();
    assert_eq!(identifier, "pod-reader");
    assert_eq!(store.len(), 2);

    cluster_roles.delete(&identifier).await.unwrap();
    assert!(matches!(
        roles.exists("default/pod-reader").await,
        Existence::Found
    ));
}

#[tokio::test]
async fn managed_object_converges() {
    let store = InMemoryStore::new();
    let mut object = ManagedObject::new(RoleBindingReconciler::new(store.clone()));

    object.apply(&read_pods()).await.unwrap();
    assert_eq!(object.identifier(), Some("default/read-pods"));

    let mut extended = read_pods();
    extended.subjects.push(stackable_rbac::subject::SubjectConfig {
        kind: "ServiceAccount".to_owned(),
        name: "builder".to_owned(),
        namespace: Some("ci".to_owned()),
        api_group: None,
    });
    let state = object.apply(&extended).await.unwrap();
    assert_eq!(state.subjects.len(), 2);

    object.destroy().await.unwrap();
    assert!(store.is_empty());
    assert!(
        store
            .requests()
            .iter()
            .any(|request| request.verb == Verb::Delete)
    );
}
