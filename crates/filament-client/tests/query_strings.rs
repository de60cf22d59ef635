//! Canonical query string tests.
//!
//! The expected strings are fixed character for character, whitespace
//! included — the server-side parser is forgiving, but drivers agree on
//! these exact renderings and so do the assertions downstream tooling
//! makes over logged queries.

use filament_client::query::{
    Class, ClauseKind, Condition, Create, Delete, Drop, Filter, GroupBy, Index, IndexType,
    Insert, Let, Limit, Lock, Move, OrderBy, Parallel, Property, PropertyType, Return, Select,
    Skip, Statement, Timeout, Traverse, TraverseTarget, Truncate, Update, UpdateAction,
    UpdateTarget, Upsert, Where, While,
};
use filament_client::Error;
use filament_record::{Edge, FieldValue, Rid, Vertex};

fn eq(cond: Condition) -> Filter {
    Filter::from(cond)
}

#[test]
fn select_plain() {
    assert_eq!(
        Select::from("TestLocation").parse().unwrap(),
        "select from TestLocation"
    );
}

#[test]
fn select_with_projection() {
    assert_eq!(
        Select::from("TestLocation").projections(["name"]).parse().unwrap(),
        "select name from TestLocation"
    );
}

#[test]
fn select_where_or() {
    let query = Select::from("TestLocation")
        .with(Where::new(Filter::or([
            eq(Condition::new("name").is_eq("Eddies")),
            eq(Condition::new("type").is_eq("Pizaaria")),
        ])))
        .parse()
        .unwrap();
    assert_eq!(
        query,
        "select from TestLocation  where  ( name = 'Eddies'  or type = 'Pizaaria'  )  "
    );
}

#[test]
fn select_where_and() {
    let query = Select::from("TestLocation")
        .with(Where::new(Filter::and([
            eq(Condition::new("name").is_eq("Eddies")),
            eq(Condition::new("type").is_eq("Pizaaria")),
        ])))
        .parse()
        .unwrap();
    assert_eq!(
        query,
        "select from TestLocation  where  ( name = 'Eddies'  and type = 'Pizaaria'  )  "
    );
}

#[test]
fn select_where_nested() {
    let query = Select::from("TestLocation")
        .with(Where::new(Filter::and([
            Filter::or([
                eq(Condition::new("test").is_eq("1")),
                eq(Condition::new("test").is_eq("2")),
            ]),
            eq(Condition::new("type").is_eq("Pizaaria")),
        ])))
        .parse()
        .unwrap();
    assert_eq!(
        query,
        "select from TestLocation  where  (  ( test = '1'  or test = '2'  )   and type = 'Pizaaria'  )  "
    );
}

#[test]
fn select_where_three_way_or() {
    let query = Select::from("TestLocation")
        .with(Where::new(Filter::and([
            Filter::or([
                eq(Condition::new("test").is_eq("1")),
                eq(Condition::new("test").is_eq("2")),
                eq(Condition::new("test1").is_eq("zz")),
            ]),
            eq(Condition::new("type").is_eq("Pizaaria")),
        ])))
        .parse()
        .unwrap();
    assert_eq!(
        query,
        "select from TestLocation  where  (  ( test = '1'  or test = '2'  or test1 = 'zz'  )   and type = 'Pizaaria'  )  "
    );
}

#[test]
fn select_where_sub_select() {
    let inner = Select::from("TestLocation")
        .with(Where::new(eq(Condition::new("a").is_eq("a"))));
    let query = Select::from("TestLocation")
        .with(Where::new(inner))
        .parse()
        .unwrap();
    assert_eq!(
        query,
        "select from TestLocation  where (select from TestLocation  where a = 'a' ) "
    );
}

#[test]
fn select_with_alias() {
    let query = Select::from("TestCoordinates")
        .alias("l")
        .projections(["l.a", "l.b"])
        .with(OrderBy::asc("a"))
        .with(Where::new(eq(Condition::new("l.a").is_eq("b"))))
        .parse()
        .unwrap();
    assert_eq!(
        query,
        "select l.a, l.b from TestCoordinates l  where l.a = 'b'   order by a asc "
    );
}

#[test]
fn clauses_follow_the_canonical_order() {
    // added as order-by, where, limit; emitted as where, order-by, limit
    let query = Select::from("City")
        .with(OrderBy::asc("name"))
        .with(Where::new(eq(Condition::new("name").is_eq("Berlin"))))
        .with(Limit::new(10))
        .parse()
        .unwrap();
    let where_at = query.find(" where ").unwrap();
    let order_at = query.find(" order by ").unwrap();
    let limit_at = query.find(" limit ").unwrap();
    assert!(where_at < order_at);
    assert!(order_at < limit_at);
}

#[test]
fn later_clause_of_a_kind_wins() {
    let query = Select::from("City")
        .with(Limit::new(1))
        .with(Limit::new(7))
        .parse()
        .unwrap();
    assert_eq!(query, "select from City  limit 7 ");
}

#[test]
fn clause_renders() {
    assert_eq!(OrderBy::asc("a").render().unwrap(), " order by a asc ");
    assert_eq!(OrderBy::desc("a").render().unwrap(), " order by a desc ");
    assert_eq!(
        Let::by_field("$a", "address.city").render().unwrap(),
        " let $a = address.city "
    );
    assert_eq!(GroupBy::new("name").render().unwrap(), " group by name ");
    assert_eq!(Skip::new(5).render().unwrap(), " skip 5 ");
    assert_eq!(Limit::new(1).render().unwrap(), " limit 1 ");
    assert_eq!(
        Limit::with_timeout(1, 100).render().unwrap(),
        " limit 1 timeout 100 "
    );
    assert_eq!(
        filament_client::query::Fetchplan::new("*:-1").render().unwrap(),
        " fetchplan *:-1 "
    );
    assert_eq!(Timeout::new(100).render().unwrap(), " timeout 100 ");
    assert_eq!(Lock::default().render().unwrap(), " lock default ");
    assert_eq!(Lock::record().render().unwrap(), " lock record ");
    assert_eq!(Parallel::new().render().unwrap(), " parallel ");
    assert_eq!(Upsert::new().render().unwrap(), " upsert ");
    assert_eq!(Return::count().render().unwrap(), " return count");
    assert_eq!(Return::after("@this").render().unwrap(), " return after @this");
    assert_eq!(
        Where::new(eq(Condition::new("a").is_in([1, 2]))).render().unwrap(),
        " where a in [1, 2] "
    );
    assert_eq!(
        While::new(eq(Condition::new("a").is_eq("b"))).render().unwrap(),
        " while a = 'b' "
    );
    assert_eq!(ClauseKind::Where, Where::new(eq(Condition::new("a").is_eq(1))).kind());
}

#[test]
fn condition_operators() {
    for (cond, expected) in [
        (Condition::new("a").is_eq(5), "a = 5"),
        (Condition::new("a").is_le(5), "a <= 5"),
        (Condition::new("a").is_lt(5), "a < 5"),
        (Condition::new("a").is_ge(5), "a >= 5"),
        (Condition::new("a").is_gt(5), "a > 5"),
    ] {
        assert_eq!(
            Where::new(eq(cond)).render().unwrap(),
            format!(" where {expected} ")
        );
    }
}

#[test]
fn insert_statement() {
    let query = Insert::into("TestCoordinates")
        .value("lat", 5)
        .value("lng", "10")
        .parse()
        .unwrap();
    assert_eq!(
        query,
        "insert into TestCoordinates ( lat, lng ) values ('5','10')"
    );
}

#[test]
fn insert_from_vertex_uses_its_persistent_attributes() {
    let vertex = Vertex::new("TestCoordinates");
    vertex.set_field("lat", FieldValue::Integer(5));
    vertex.set_field("lng", FieldValue::from("10"));
    let query = Insert::from_vertex(&vertex).unwrap().parse().unwrap();
    assert_eq!(
        query,
        "insert into TestCoordinates ( lat, lng ) values ('5','10')"
    );
}

#[test]
fn update_by_rid() {
    let query = Update::new(
        "#12:2",
        UpdateAction::set(vec![("a".into(), 5.into()), ("b".into(), 6.into())]),
    )
    .parse()
    .unwrap();
    assert_eq!(query, "update #12:2  set a = 5, b = 6");
}

#[test]
fn update_class_with_upsert() {
    let query = Update::new(
        UpdateTarget::Class("TestCoordinates".into()),
        UpdateAction::set(vec![("a".into(), "5".into()), ("b".into(), 6.into())]),
    )
    .with(Upsert::new())
    .parse()
    .unwrap();
    assert_eq!(query, "update TestCoordinates  set a = '5', b = 6  upsert ");
}

#[test]
fn update_actions() {
    for (action, expected) in [
        (
            UpdateAction::increment(vec![("n".into(), 1.into())]),
            "update #1:1  increment n = 1",
        ),
        (
            UpdateAction::add(vec![("tags".into(), "new".into())]),
            "update #1:1  add tags = 'new'",
        ),
        (
            UpdateAction::remove(vec![("tags".into(), "old".into())]),
            "update #1:1  remove tags = 'old'",
        ),
        (
            UpdateAction::put(vec![("m".into(), "v".into())]),
            "update #1:1  put m = 'v'",
        ),
        (
            UpdateAction::content("{\"a\": 1}"),
            "update #1:1  content {\"a\": 1}",
        ),
        (
            UpdateAction::merge("{\"a\": 1}"),
            "update #1:1  merge {\"a\": 1}",
        ),
    ] {
        assert_eq!(Update::new("#1:1", action).parse().unwrap(), expected);
    }
}

#[test]
fn create_property() {
    assert_eq!(
        Create::property(Property::new("TestCoordinates", "land", PropertyType::String))
            .parse()
            .unwrap(),
        "create property TestCoordinates.land STRING"
    );
    assert_eq!(
        Create::property(Property::with_linked_class(
            "TestCoordinates",
            "land",
            PropertyType::EmbeddedList,
            "TestLocation"
        ))
        .parse()
        .unwrap(),
        "create property TestCoordinates.land EMBEDDEDLIST TestLocation"
    );
    assert_eq!(
        Create::property(Property::with_linked_type(
            "TestCoordinates",
            "land",
            PropertyType::LinkList,
            PropertyType::Integer
        ))
        .parse()
        .unwrap(),
        "create property TestCoordinates.land LINKLIST INTEGER"
    );
}

#[test]
fn property_with_both_links_is_rejected() {
    let property = Property::new("C", "p", PropertyType::String)
        .linked_type(PropertyType::Integer)
        .linked_class("Other");
    assert!(matches!(
        Create::property(property).parse(),
        Err(Error::SqlCommand(_))
    ));
}

#[test]
fn delete_statements() {
    assert_eq!(
        Delete::class(Class::vertex("TestCoordinates")).parse().unwrap(),
        "delete  vertex TestCoordinates"
    );
    assert_eq!(
        Delete::class(Class::edge("TestEdgeOne")).parse().unwrap(),
        "delete  edge TestEdgeOne"
    );
    assert_eq!(
        Delete::vertex().by_rid("#12:2").parse().unwrap(),
        "delete vertex  #12:2 "
    );
    assert_eq!(
        Delete::edge().by_rid("#10:10").parse().unwrap(),
        "delete edge  #10:10 "
    );
    assert_eq!(
        Delete::edge().to_rid("#10:10").parse().unwrap(),
        "delete edge  to #10:10 "
    );
    assert_eq!(
        Delete::edge().from_rid("#10:10").parse().unwrap(),
        "delete edge  from #10:10 "
    );
    assert_eq!(
        Delete::edge().from_rid("#2:3").to_rid("#1:2").parse().unwrap(),
        "delete edge  from #2:3 to #1:2 "
    );
}

#[test]
fn delete_accepts_rid_objects() {
    assert_eq!(
        Delete::edge().from_rid(Rid::new(2, 3)).to_rid(Rid::new(1, 2)).parse().unwrap(),
        "delete edge  from #2:3 to #1:2 "
    );
}

#[test]
fn delete_entities() {
    let vertex = Vertex::new("TestCoordinates");
    vertex.set_rid(Rid::new(5, 5));
    assert_eq!(
        Delete::entity(&vertex).parse().unwrap(),
        "delete  vertex #5:5 "
    );

    let edge = Edge::new("TestEdgeOne");
    edge.set_rid(Rid::new(10, 10));
    assert_eq!(Delete::entity(&edge).parse().unwrap(), "delete  edge #10:10 ");

    let query = Delete::entity(&edge)
        .with(Where::new(eq(Condition::new("a").is_eq(5))))
        .parse()
        .unwrap();
    assert_eq!(query, "delete  edge #10:10   where a = 5 ");
}

#[test]
fn delete_vertex_drops_from_and_to() {
    let query = Delete::vertex()
        .from_rid("#2:3")
        .to_rid("#1:2")
        .by_rid("#12:2")
        .parse()
        .unwrap();
    assert_eq!(query, "delete vertex  #12:2 ");
}

#[test]
fn delete_detached_entity_is_rejected() {
    let vertex = Vertex::new("TestCoordinates");
    assert!(matches!(
        Delete::entity(&vertex).parse(),
        Err(Error::SqlCommand(_))
    ));
}

#[test]
fn drop_statements() {
    assert_eq!(
        Drop::class("TestLocation").parse().unwrap(),
        "drop class TestLocation"
    );
    assert_eq!(
        Drop::property(Property::named("TestLocation", "Test")).parse().unwrap(),
        "drop property TestLocation.Test"
    );
    assert_eq!(Drop::index("test").parse().unwrap(), "drop index test");
    assert_eq!(
        Drop::cluster("testcluster").parse().unwrap(),
        "drop cluster testcluster"
    );
}

#[test]
fn create_index() {
    assert_eq!(
        Create::index(
            Index::new("test")
                .on("TestCoordinates")
                .with_properties(["id", "bla", "hallo"])
        )
        .parse()
        .unwrap(),
        "create index test on TestCoordinates (id, bla, hallo) "
    );
    assert_eq!(
        Create::index(
            Index::new("test")
                .on("TestCoordinates")
                .with_properties(["id", "bla", "hallo"])
                .with_metadata("{lala: false}")
        )
        .parse()
        .unwrap(),
        "create index test on TestCoordinates (id, bla, hallo)  metadata {lala: false}"
    );
    assert_eq!(
        Create::index(Index::new("id").on("TestCoordinates")).parse().unwrap(),
        "create index TestCoordinates.id"
    );
    assert_eq!(
        Create::index(
            Index::new("id")
                .on("TestCoordinates")
                .index_type(IndexType::Unique)
        )
        .parse()
        .unwrap(),
        "create index TestCoordinates.id unique"
    );
}

#[test]
fn create_class() {
    assert_eq!(
        Create::class(Class::vertex("TestCoordinates")).parse().unwrap(),
        "create class TestCoordinates extends V"
    );
    assert_eq!(
        Create::class(Class::edge("TestEdgeOne")).parse().unwrap(),
        "create class TestEdgeOne extends E"
    );
}

#[test]
fn create_vertex_from_entity() {
    let vertex = Vertex::new("City");
    vertex.set_field("name", FieldValue::from("Kassel"));
    assert_eq!(
        Create::vertex(&vertex).parse().unwrap(),
        "create vertex City set name = \"Kassel\""
    );

    vertex.set_field("country", FieldValue::from("DE"));
    assert_eq!(
        Create::vertex(&vertex).parse().unwrap(),
        "create vertex City set country = \"DE\" , name = \"Kassel\""
    );
}

#[test]
fn create_edge_from_entity() {
    let from = Vertex::new("Person");
    from.set_rid(Rid::new(9, 0));
    let to = Vertex::new("Person");
    to.set_rid(Rid::new(9, 1));

    let edge = Edge::new("Friend");
    edge.set_in_vertex(from);
    edge.set_out_vertex(to);
    assert_eq!(
        Create::edge(&edge).parse().unwrap(),
        "create edge Friend from #9:0 to #9:1"
    );
}

#[test]
fn create_edge_without_endpoints_is_rejected() {
    let edge = Edge::new("Friend");
    assert!(matches!(
        Create::edge(&edge).parse(),
        Err(Error::SqlCommand(_))
    ));
}

#[test]
fn move_statements() {
    assert_eq!(
        Move::to_class("#12:2", "TestLocation").parse().unwrap(),
        "move vertex #12:2 to class: TestLocation"
    );
    assert_eq!(
        Move::to_cluster("#12:2", "testcluster").parse().unwrap(),
        "move vertex #12:2 to cluster: testcluster"
    );
}

#[test]
fn traverse_statements() {
    assert_eq!(
        Traverse::new("#12:2", ["a", "b"]).parse().unwrap(),
        "traverse a, b  from #12:2 "
    );
    assert_eq!(
        Traverse::new(TraverseTarget::Class("TestLocation".into()), ["a", "b"])
            .parse()
            .unwrap(),
        "traverse a, b  from TestLocation "
    );
    assert_eq!(
        Traverse::new(TraverseTarget::Cluster("testcluster".into()), ["a", "b"])
            .parse()
            .unwrap(),
        "traverse a, b  from testcluster "
    );
    assert_eq!(
        Traverse::new(
            TraverseTarget::Multi(vec![
                TraverseTarget::Cluster("testcl1".into()),
                TraverseTarget::Cluster("testcl2".into()),
            ]),
            ["a", "b"]
        )
        .parse()
        .unwrap(),
        "traverse a, b  from testcl1, testcl2 "
    );
    assert_eq!(
        Traverse::new(TraverseTarget::rids(["#13:4", "#12:4"]), ["a", "b"])
            .parse()
            .unwrap(),
        "traverse a, b  from #13:4, #12:4 "
    );
    assert_eq!(
        Traverse::new(TraverseTarget::rids(["#13:4", "#12:4"]), ["a", "b"])
            .with(While::new(eq(Condition::new("a").is_eq("b"))))
            .parse()
            .unwrap(),
        "traverse a, b  from #13:4, #12:4   while a = 'b' "
    );
    assert_eq!(
        Traverse::new(TraverseTarget::rids(["#13:4", "#12:4"]), ["a", "b"])
            .with(Limit::new(1))
            .parse()
            .unwrap(),
        "traverse a, b  from #13:4, #12:4   limit 1 "
    );
}

#[test]
fn traverse_from_sub_select() {
    let select = Select::from("TestLocation").with(Where::new(Filter::or([
        eq(Condition::new("name").is_eq("Eddies")),
        eq(Condition::new("type").is_eq("Pizaaria")),
    ])));
    assert_eq!(
        Traverse::new(select, ["a", "b"]).parse().unwrap(),
        "traverse a, b  from  ( select from TestLocation  where  ( name = 'Eddies'  or type = 'Pizaaria'  )   ) "
    );
}

#[test]
fn truncate_statements() {
    assert_eq!(
        Truncate::class("TestLocation").parse().unwrap(),
        "truncate class TestLocation"
    );
    assert_eq!(
        Truncate::cluster("testcluster").parse().unwrap(),
        "truncate cluster testcluster"
    );
    assert_eq!(
        Truncate::record("#12:2").parse().unwrap(),
        "truncate record #12:2"
    );
}
