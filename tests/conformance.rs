// Cross-strategy conformance tests
//
// Each scenario runs through every decode strategy that can produce
// comparable output (sequential, parallel, streaming). A new scenario
// automatically checks all of them; failures pinpoint which strategy
// diverges.

use turbocsv::{
    decode, decode_parallel, decode_positional, decode_records, decode_rows, encode,
    encode_to_string, BoolDecodingStrategy, ByteSource, Config, Error, FromRecord,
    KeyDecodingStrategy, MemoryBudget, NestedDecodingStrategy, NumberDecodingStrategy,
    OrderedKeys, ParsingMode, RecordView, Result, RowMap, ToRecord,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn stream_all(input: &[u8], config: &Config) -> Result<Vec<RowMap>> {
    let source = ByteSource::from_bytes(input.to_vec());
    turbocsv::stream::<RowMap>(source, config).collect()
}

/// Decode through all three strategies and require identical output.
fn decode_everywhere(input: &[u8], config: &Config) -> Vec<RowMap> {
    let sequential = decode_records(input, config).unwrap();
    let parallel: Vec<RowMap> = decode_parallel(input, config).unwrap();
    let streamed = stream_all(input, config).unwrap();

    assert_eq!(sequential, parallel, "parallel decode diverges");
    assert_eq!(sequential, streamed, "streaming decode diverges");
    sequential
}

fn errors_everywhere(input: &[u8], config: &Config) -> Vec<Error> {
    let sequential = decode_records(input, config).unwrap_err();
    let parallel = decode_parallel::<RowMap>(input, config).unwrap_err();
    let streamed = stream_all(input, config).unwrap_err();
    vec![sequential, parallel, streamed]
}

fn get(map: &RowMap, key: &str) -> Option<String> {
    map.get(key).cloned().flatten()
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_quoted_crlf_inside_field() {
    let input = b"name,value\r\nTest,\"Line1\r\nLine2\"\r\n";
    let records = decode_everywhere(input, &Config::new());
    assert_eq!(records.len(), 1);
    assert_eq!(get(&records[0], "name").as_deref(), Some("Test"));
    assert_eq!(get(&records[0], "value").as_deref(), Some("Line1\r\nLine2"));
}

#[test]
fn scenario_doubled_quote_escape() {
    let input = b"name,value\nA,\"Say \"\"hi\"\"\"\n";
    let records = decode_everywhere(input, &Config::new());
    assert_eq!(records.len(), 1);
    assert_eq!(get(&records[0], "value").as_deref(), Some("Say \"hi\""));
}

#[test]
fn scenario_empty_and_consecutive_delimiters() {
    let input = b"a,b,c\n1,,3\n,,\n";
    let records = decode_everywhere(input, &Config::new());
    assert_eq!(records.len(), 2);

    assert_eq!(get(&records[0], "a").as_deref(), Some("1"));
    assert_eq!(records[0].get("b"), Some(&None));
    assert_eq!(get(&records[0], "c").as_deref(), Some("3"));

    for key in ["a", "b", "c"] {
        assert_eq!(records[1].get(key), Some(&None), "column {key}");
    }
}

#[test]
fn scenario_unterminated_quote_strict() {
    let input = b"name,value\nTest,\"Unterminated";
    let config = Config::new().parsing_mode(ParsingMode::Strict);
    for err in errors_everywhere(input, &config) {
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }
}

#[test]
fn scenario_parallel_correctness_with_quoted_newlines() {
    let mut input = b"id,payload\n".to_vec();
    for i in 0..10_000 {
        if i % 7 == 0 {
            input.extend_from_slice(format!("{i},\"first\nsecond {i}\"\n").as_bytes());
        } else {
            input.extend_from_slice(format!("{i},plain {i}\n").as_bytes());
        }
    }
    let records = decode_everywhere(&input, &Config::new());
    assert_eq!(records.len(), 10_000);
    assert_eq!(
        get(&records[0], "payload").as_deref(),
        Some("first\nsecond 0")
    );
    assert_eq!(get(&records[1], "payload").as_deref(), Some("plain 1"));
    assert_eq!(
        get(&records[9996], "payload").as_deref(),
        Some("first\nsecond 9996")
    );
}

#[test]
fn scenario_flexible_numbers() {
    #[derive(Debug, PartialEq)]
    struct Price {
        amount: f64,
    }
    impl FromRecord for Price {
        fn from_record(record: &RecordView<'_>) -> Result<Self> {
            Ok(Price {
                amount: record.field("amount")?,
            })
        }
    }

    let input = "amount\n\"$1,234.56\"\n\"1.234,56\"\n1234.56\n\"\u{20ac} 45,00\"\n";
    let config = Config::new().number_decoding(NumberDecodingStrategy::Flexible);
    let prices: Vec<Price> = decode(input.as_bytes(), &config).unwrap();
    assert_eq!(
        prices.iter().map(|p| p.amount).collect::<Vec<_>>(),
        vec![1234.56, 1234.56, 1234.56, 45.0]
    );
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn invariant_round_trip_stable_subset() {
    let input = b"name,qty,notes\nwidget,4,plain\ngadget,9,\"with,comma\"\nnut,1,\"say \"\"hi\"\"\"\n";
    let config = Config::new();
    let records = decode_records(input, &config).unwrap();
    let encoded = encode(&records, &config).unwrap();
    let again = decode_records(&encoded, &config).unwrap();
    assert_eq!(records, again);
}

#[test]
fn invariant_escape_involution_end_to_end() {
    let nasty = vec![
        "plain",
        "with,comma",
        "say \"hi\"",
        "line\nbreak",
        "crlf\r\nbreak",
        "\"",
        "\"\"",
        ",",
        "",
    ];
    let mut map = RowMap::new();
    for (i, s) in nasty.iter().enumerate() {
        map.insert(format!("c{i}"), Some(s.to_string()));
    }
    // Empty string is nil under the default strategy, so keep it nullable.
    let config = Config::new();
    let encoded = encode(&[map.clone()], &config).unwrap();
    let decoded = decode_records(&encoded, &config).unwrap();
    assert_eq!(decoded.len(), 1);
    for (i, s) in nasty.iter().enumerate() {
        let got = get(&decoded[0], &format!("c{i}"));
        if s.is_empty() {
            assert_eq!(got, None, "empty string decodes as nil");
        } else {
            assert_eq!(got.as_deref(), Some(*s), "field {i}");
        }
    }
}

#[test]
fn invariant_row_count_conservation() {
    // 4 terminator-separated rows, 1 header, 1 trailing empty row.
    let input = b"h1,h2\na,b\nc,d\ne,f\n\n";
    let records = decode_everywhere(input, &Config::new());
    assert_eq!(records.len(), 3);

    let rows = decode_rows(input, &Config::new().has_headers(false)).unwrap();
    assert_eq!(rows.len(), 4);
}

#[test]
fn invariant_bom_transparency() {
    let plain = b"a,b\n1,2\n".to_vec();
    let mut with_bom = vec![0xEF, 0xBB, 0xBF];
    with_bom.extend_from_slice(&plain);

    let config = Config::new();
    assert_eq!(
        decode_records(&plain, &config).unwrap(),
        decode_records(&with_bom, &config).unwrap()
    );
}

#[test]
fn invariant_streaming_equals_buffered_small_batches() {
    let mut input = b"k,v\n".to_vec();
    for i in 0..997 {
        input.extend_from_slice(format!("k{i},\"v {i}\n next\"\n").as_bytes());
    }
    let mut config = Config::new();
    config.budget = MemoryBudget {
        budget_bytes: 64 * 64,
        estimated_row_size: 64,
        batch_size: 16,
        high_water: 0.8,
        low_water: 0.3,
    };
    let buffered = decode_records(&input, &config).unwrap();
    let streamed = stream_all(&input, &config).unwrap();
    assert_eq!(buffered, streamed);
    assert_eq!(buffered.len(), 997);
}

#[test]
fn invariant_location_accuracy() {
    // Error on the 4th physical line.
    let input = b"h\nok\nok\n\"broken";
    let config = Config::new().parsing_mode(ParsingMode::Strict);
    match decode_records(input, &config) {
        Err(Error::Parse { line, column, .. }) => {
            assert_eq!(line, 4);
            assert_eq!(column, 1);
        }
        other => panic!("expected Parse error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Typed records end to end
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Person {
    user_name: String,
    age: u32,
    active: bool,
    balance: Option<f64>,
}

impl FromRecord for Person {
    fn from_record(record: &RecordView<'_>) -> Result<Self> {
        Ok(Person {
            user_name: record.field("user_name")?,
            age: record.field("age")?,
            active: record.field("active")?,
            balance: record.opt_field("balance")?,
        })
    }
}

impl ToRecord for Person {
    fn to_record(&self, config: &Config) -> Result<RowMap> {
        let mut map = RowMap::new();
        map.set("user_name", &self.user_name, config)?;
        map.set("age", &self.age, config)?;
        map.set("active", &self.active, config)?;
        map.set("balance", &self.balance, config)?;
        Ok(map)
    }
}

impl OrderedKeys for Person {
    fn ordered_keys() -> &'static [&'static str] {
        &["user_name", "age", "active", "balance"]
    }
}

#[test]
fn typed_decode_with_key_strategy() {
    let input = b"UserName,Age,Active,Balance\nada,36,yes,10.5\nbob,41,no,\n";
    let config = Config::new()
        .key_decoding(KeyDecodingStrategy::FromPascalCase)
        .bool_decoding(BoolDecodingStrategy::Standard);
    let people: Vec<Person> = decode(input, &config).unwrap();
    assert_eq!(
        people,
        vec![
            Person {
                user_name: "ada".into(),
                age: 36,
                active: true,
                balance: Some(10.5),
            },
            Person {
                user_name: "bob".into(),
                age: 41,
                active: false,
                balance: None,
            },
        ]
    );
}

#[test]
fn typed_positional_decode() {
    let input = b"ada,36,1,9.25\nbob,41,0,\n";
    let config = Config::new().has_headers(false);
    let people: Vec<Person> = decode_positional(input, &config).unwrap();
    assert_eq!(people.len(), 2);
    assert_eq!(people[0].user_name, "ada");
    assert!(people[0].active);
    assert_eq!(people[1].balance, None);
}

#[test]
fn typed_round_trip() {
    let people = vec![
        Person {
            user_name: "ada".into(),
            age: 36,
            active: true,
            balance: Some(10.5),
        },
        Person {
            user_name: "grace, adm".into(),
            age: 79,
            active: false,
            balance: None,
        },
    ];
    let config = Config::new();
    let bytes = encode(&people, &config).unwrap();
    let back: Vec<Person> = decode(&bytes, &config).unwrap();
    assert_eq!(people, back);
}

#[test]
fn typed_nested_flatten() {
    #[derive(Debug, PartialEq)]
    struct Order {
        id: u64,
        street: String,
        city: String,
    }
    impl FromRecord for Order {
        fn from_record(record: &RecordView<'_>) -> Result<Self> {
            let addr = record.nested("addr")?;
            Ok(Order {
                id: record.field("id")?,
                street: addr.field("street")?,
                city: addr.field("city")?,
            })
        }
    }

    let input = b"id,addr.street,addr.city\n7,Main St,Springfield\n";
    let config = Config::new().nested_decoding(NestedDecodingStrategy::Flatten {
        separator: ".".to_string(),
    });
    let orders: Vec<Order> = decode(input, &config).unwrap();
    assert_eq!(
        orders,
        vec![Order {
            id: 7,
            street: "Main St".into(),
            city: "Springfield".into(),
        }]
    );
}

#[test]
fn typed_key_not_found_suggestion() {
    #[derive(Debug)]
    struct Wanting;
    impl FromRecord for Wanting {
        fn from_record(record: &RecordView<'_>) -> Result<Self> {
            let _: String = record.field("user_nmae")?;
            Ok(Wanting)
        }
    }

    let input = b"user_name\nada\n";
    let err = decode::<Wanting>(input, &Config::new()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("user_nmae"));
    assert!(msg.contains("user_name"), "suggestion missing: {msg}");
}

// ---------------------------------------------------------------------------
// Dialect and mode edges
// ---------------------------------------------------------------------------

#[test]
fn custom_delimiter_round_trip() {
    let config = Config::new().delimiter(b';');
    let input = b"a;b\n1;\"x;y\"\n";
    let records = decode_everywhere(input, &config);
    assert_eq!(get(&records[0], "b").as_deref(), Some("x;y"));

    let out = encode_to_string(&records, &config).unwrap();
    assert_eq!(out, "a;b\n1;\"x;y\"\n");
}

#[test]
fn lenient_stray_quote_decodes_literally() {
    let input = b"col\nab\"cd\n";
    let records = decode_everywhere(input, &Config::new());
    assert_eq!(get(&records[0], "col").as_deref(), Some("ab\"cd"));
}

#[test]
fn strict_field_count_mismatch() {
    let input = b"a,b\n1,2,3\n";
    let config = Config::new()
        .parsing_mode(ParsingMode::Strict)
        .expected_field_count(2);
    for err in errors_everywhere(input, &config) {
        assert!(matches!(err, Error::Parse { line: 2, .. }), "{err:?}");
    }
}

#[test]
fn headerless_synthesizes_column_names() {
    let input = b"1,2\n3,4\n";
    let config = Config::new().has_headers(false);
    let records = decode_everywhere(input, &config);
    assert_eq!(records.len(), 2);
    assert_eq!(get(&records[0], "column0").as_deref(), Some("1"));
    assert_eq!(get(&records[1], "column1").as_deref(), Some("4"));
}

#[test]
fn latin1_fields_decode_per_declared_encoding() {
    let mut input = b"name\n".to_vec();
    input.extend_from_slice(b"caf\xe9\n");
    let config = Config::new().encoding(turbocsv::SourceEncoding::Latin1);
    let records = decode_records(&input, &config).unwrap();
    assert_eq!(get(&records[0], "name").as_deref(), Some("caf\u{e9}"));
}

#[test]
fn utf16_input_with_bom_decodes() {
    let text = "a,b\n1,2\n";
    let mut input = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        input.extend_from_slice(&unit.to_le_bytes());
    }
    let records = decode_records(&input, &Config::new()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(get(&records[0], "a").as_deref(), Some("1"));
}
