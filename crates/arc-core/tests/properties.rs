//! Property-based tests for id arithmetic, storage keys, tags and the tx codec.

use proptest::prelude::*;

use arc_core::codec::{decode_tx, encode_tx, encode_tx_compressed};
use arc_core::model::{Eid, OpCode, SeriesIndex, TagSpec, Tx, TxHeader, TxOp, TxStatus, Value};

fn any_eid() -> impl Strategy<Value = Eid> {
    any::<[u64; 3]>().prop_map(Eid)
}

fn any_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int64),
        any::<u64>().prop_map(|bits| Value::Float64(f64::from_bits(bits & !(0x7FF << 52)))),
        "[ -~]{0,40}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
        any_eid().prop_map(Value::Eid),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn fold_commutes_and_associates(a in any_eid(), b in any_eid(), c in any_eid()) {
        prop_assert_eq!(a.fold(b), b.fold(a));
        prop_assert_eq!(a.fold(b).fold(c), a.fold(b.fold(c)));
        prop_assert_eq!(a.fold(b).sequence(b), a);
    }

    #[test]
    fn sub_inverts_add(a in any_eid(), b in any_eid()) {
        prop_assert_eq!(a.add(b).sub(b), a);
        prop_assert_eq!(a.sub(b).add(b), a);
    }

    #[test]
    fn add_never_carries_into_time_word(w0 in any::<u64>(), w2 in any::<u64>()) {
        let a = Eid([w0, u64::MAX, w2]);
        let b = Eid([0, 0, u64::MAX]);
        prop_assert_eq!(a.add(b).0[0], w0);
    }

    #[test]
    fn storage_keys_invert(id in any_eid()) {
        prop_assert_eq!(Eid::from_key24(&id.to_key24()), id);
        let low = Eid([0, id.0[1], id.0[2]]);
        prop_assert_eq!(Eid::from_key16(&id.to_key16()), low);
        prop_assert_eq!(Eid::from_uuid(id.to_uuid()), low);
    }

    #[test]
    fn text_forms_parse_back(id in any_eid()) {
        let b32 = id.base32();
        prop_assert_eq!(b32.len(), 40);
        prop_assert_eq!(b32.parse::<Eid>().unwrap(), id);
        prop_assert_eq!(id.base16().parse::<Eid>().unwrap(), id);
    }

    #[test]
    fn base32_preserves_order(a in any_eid(), b in any_eid()) {
        prop_assert_eq!(a.cmp(&b), a.base32().cmp(&b.base32()));
    }

    #[test]
    fn tag_order_is_irrelevant(tokens in prop::collection::vec("[a-z0-9]{1,8}", 1..6)) {
        let forward = TagSpec::parse(&tokens.join("."));
        let mut reversed = tokens.clone();
        reversed.reverse();
        let backward = TagSpec::parse(&reversed.join(" "));
        prop_assert!(forward.same_tag(&backward));

        let folded = tokens.iter().fold(Eid::NIL, |acc, t| acc.with_token(t));
        prop_assert_eq!(forward.id, folded);
    }

    #[test]
    fn tag_extension_matches_single_parse(
        head in prop::collection::vec("[a-z]{1,6}", 1..4),
        tail in prop::collection::vec("[a-z]{1,6}", 1..4),
    ) {
        let extended = TagSpec::parse(&head.join(".")).with(&tail.join("."));
        let whole = TagSpec::parse(&format!("{}.{}", head.join("."), tail.join(".")));
        prop_assert_eq!(extended.id, whole.id);
        prop_assert_eq!(extended.canonic, whole.canonic);
    }

    #[test]
    fn tx_survives_the_wire(
        route_to in any::<[u64; 2]>(),
        entries in prop::collection::vec((any_eid(), any_eid(), any::<(u64, u64)>(), any_value()), 0..12),
        padding in prop::collection::vec(any::<u8>(), 0..16),
    ) {
        let mut tx = Tx::with_header(TxHeader { status: TxStatus::Syncing, route_to });
        for (target, attr, (si0, si1), value) in &entries {
            let mut op = TxOp::new(OpCode::UpsertAttr);
            op.target = *target;
            op.attr = *attr;
            op.si = SeriesIndex(*si0, *si1);
            tx.push_op_value(&mut op, value).unwrap();
        }
        // Unreferenced arena bytes are carried verbatim.
        tx.arena.extend_from_slice(&padding);

        let bytes = encode_tx(&tx).unwrap();
        let decoded = decode_tx(&bytes).unwrap();
        prop_assert_eq!(&decoded, &tx);
        for (op, (_, _, _, value)) in decoded.ops.iter().zip(&entries) {
            prop_assert_eq!(&decoded.load_value::<Value>(op).unwrap(), value);
        }

        let compressed = encode_tx_compressed(&tx, 3).unwrap();
        prop_assert_eq!(decode_tx(&compressed).unwrap(), tx);
    }
}
