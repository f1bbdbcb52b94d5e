//! Integration tests for the full XTCE codec pipeline.
//!
//! These tests verify end-to-end behavior: XML document -> schema ->
//! decode and encode, including container inheritance dispatch,
//! command argument handling, explicit bit locations, and seeded
//! randomized round trips.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use xtce_codec_core::calibrate::{PolynomialCalibrator, PolynomialTerm};
use xtce_codec_core::container::{EntryLocation, LocationReference};
use xtce_codec_core::encoding::{IntegerEncoding, Signedness};
use xtce_codec_core::schema::{
    ArgumentDecl, ContainerDecl, EntryDecl, MetaCommandDecl, ParameterDecl, TypeDecl,
};
use xtce_codec_core::types::{ArrayDimension, ParameterType};
use xtce_codec_core::{
    decode_command, decode_packet, encode_command, encode_packet, load_str, Schema, SpaceSystem,
    Value, ValueMap,
};

/// A CCSDS-flavored document: sub-byte header fields, a calibrated
/// temperature, an enumeration, and a boolean, dispatched by APID.
const TELEMETRY_XML: &str = r#"
<SpaceSystem name="BogusSAT">
  <TelemetryMetaData>
    <ParameterTypeSet>
      <IntegerParameterType name="U3">
        <IntegerDataEncoding sizeInBits="3"/>
      </IntegerParameterType>
      <IntegerParameterType name="U1">
        <IntegerDataEncoding sizeInBits="1"/>
      </IntegerParameterType>
      <IntegerParameterType name="U11">
        <IntegerDataEncoding sizeInBits="11"/>
      </IntegerParameterType>
      <IntegerParameterType name="U16">
        <IntegerDataEncoding sizeInBits="16"/>
      </IntegerParameterType>
      <IntegerParameterType name="DegreesC">
        <UnitSet><Unit>degC</Unit></UnitSet>
        <IntegerDataEncoding sizeInBits="16">
          <DefaultCalibrator>
            <PolynomialCalibrator>
              <Term coefficient="1.0" exponent="0"/>
              <Term coefficient="2.0" exponent="1"/>
            </PolynomialCalibrator>
          </DefaultCalibrator>
        </IntegerDataEncoding>
      </IntegerParameterType>
      <EnumeratedParameterType name="ModeType">
        <IntegerDataEncoding sizeInBits="8"/>
        <EnumerationList>
          <Enumeration value="1" label="SAFE"/>
          <Enumeration value="2" label="NOMINAL"/>
        </EnumerationList>
      </EnumeratedParameterType>
      <BooleanParameterType name="HealthType" zeroStringValue="UNHEALTHY" oneStringValue="HEALTHY">
        <IntegerDataEncoding sizeInBits="8"/>
      </BooleanParameterType>
    </ParameterTypeSet>
    <ParameterSet>
      <Parameter name="ccsds_version" parameterTypeRef="U3"/>
      <Parameter name="packet_type" parameterTypeRef="U1"/>
      <Parameter name="sec_hdr_flag" parameterTypeRef="U1"/>
      <Parameter name="apid" parameterTypeRef="U11"/>
      <Parameter name="pkt_length" parameterTypeRef="U16"/>
      <Parameter name="temperature" parameterTypeRef="DegreesC"/>
      <Parameter name="mode" parameterTypeRef="ModeType"/>
      <Parameter name="healthy" parameterTypeRef="HealthType"/>
    </ParameterSet>
    <ContainerSet>
      <SequenceContainer name="CCSDSPacket" abstract="true">
        <EntryList>
          <ParameterRefEntry parameterRef="ccsds_version"/>
          <ParameterRefEntry parameterRef="packet_type"/>
          <ParameterRefEntry parameterRef="sec_hdr_flag"/>
          <ParameterRefEntry parameterRef="apid"/>
          <ParameterRefEntry parameterRef="pkt_length"/>
        </EntryList>
      </SequenceContainer>
      <SequenceContainer name="HousekeepingPacket">
        <EntryList>
          <ParameterRefEntry parameterRef="temperature"/>
          <ParameterRefEntry parameterRef="mode"/>
          <ParameterRefEntry parameterRef="healthy"/>
        </EntryList>
        <BaseContainer containerRef="CCSDSPacket">
          <RestrictionCriteria>
            <ComparisonList>
              <Comparison parameterRef="apid" value="42"/>
            </ComparisonList>
          </RestrictionCriteria>
        </BaseContainer>
      </SequenceContainer>
    </ContainerSet>
  </TelemetryMetaData>
</SpaceSystem>
"#;

/// Housekeeping packet for APID 42: temp raw 2 (eng 5.0), mode SAFE,
/// healthy true.
const HK_PACKET: &[u8] = &[0x00, 0x2A, 0x00, 0x05, 0x00, 0x02, 0x01, 0x01];

#[test]
fn test_telemetry_decode_full_pipeline() {
    let schema = Schema::build(load_str(TELEMETRY_XML).unwrap()).unwrap();

    let decoded = decode_packet(&schema, "CCSDSPacket", HK_PACKET).unwrap();
    assert_eq!(decoded.container, "/BogusSAT/HousekeepingPacket");

    let get = |name: &str| decoded.values.get(name).unwrap().engineering.clone();
    assert_eq!(get("/BogusSAT/ccsds_version"), Value::Unsigned(0));
    assert_eq!(get("/BogusSAT/apid"), Value::Unsigned(42));
    assert_eq!(get("/BogusSAT/pkt_length"), Value::Unsigned(5));
    assert_eq!(get("/BogusSAT/temperature"), Value::Float(5.0));
    assert_eq!(get("/BogusSAT/mode"), Value::String("SAFE".into()));
    assert_eq!(get("/BogusSAT/healthy"), Value::String("HEALTHY".into()));

    // Raw side is preserved alongside engineering values
    assert_eq!(
        decoded.values.get("/BogusSAT/temperature").unwrap().raw,
        Value::Unsigned(2)
    );
}

#[test]
fn test_telemetry_decode_order_matches_chain() {
    let schema = Schema::build(load_str(TELEMETRY_XML).unwrap()).unwrap();
    let decoded = decode_packet(&schema, "CCSDSPacket", HK_PACKET).unwrap();

    let names: Vec<_> = decoded.values.iter().map(|(n, _)| n.to_string()).collect();
    assert_eq!(
        names,
        vec![
            "/BogusSAT/ccsds_version",
            "/BogusSAT/packet_type",
            "/BogusSAT/sec_hdr_flag",
            "/BogusSAT/apid",
            "/BogusSAT/pkt_length",
            "/BogusSAT/temperature",
            "/BogusSAT/mode",
            "/BogusSAT/healthy",
        ]
    );
}

#[test]
fn test_telemetry_encode_matches_fixture() {
    let schema = Schema::build(load_str(TELEMETRY_XML).unwrap()).unwrap();

    let mut values = ValueMap::new();
    values.set("/BogusSAT/ccsds_version", Value::Unsigned(0));
    values.set("/BogusSAT/packet_type", Value::Unsigned(0));
    values.set("/BogusSAT/sec_hdr_flag", Value::Unsigned(0));
    // apid omitted: the restriction implies 42
    values.set("/BogusSAT/pkt_length", Value::Unsigned(5));
    values.set("/BogusSAT/temperature", Value::Float(5.0));
    values.set("/BogusSAT/mode", Value::String("SAFE".into()));
    values.set("/BogusSAT/healthy", Value::String("HEALTHY".into()));

    let bytes = encode_packet(&schema, "HousekeepingPacket", &values).unwrap();
    assert_eq!(bytes, HK_PACKET);
}

#[test]
fn test_wrong_apid_does_not_select_child() {
    let schema = Schema::build(load_str(TELEMETRY_XML).unwrap()).unwrap();

    // APID 7 matches no child; decoding stops after the header
    let packet = [0x00, 0x07, 0x00, 0x05];
    let decoded = decode_packet(&schema, "CCSDSPacket", &packet).unwrap();
    assert_eq!(decoded.container, "/BogusSAT/CCSDSPacket");
    assert!(decoded.values.get("/BogusSAT/temperature").is_none());
}

const COMMAND_XML: &str = r#"
<SpaceSystem name="BogusSAT">
  <CommandMetaData>
    <ArgumentTypeSet>
      <IntegerArgumentType name="OpCodeType">
        <IntegerDataEncoding sizeInBits="8"/>
      </IntegerArgumentType>
      <EnumeratedArgumentType name="TargetModeType">
        <IntegerDataEncoding sizeInBits="8"/>
        <EnumerationList>
          <Enumeration value="1" label="SAFE"/>
          <Enumeration value="2" label="NOMINAL"/>
        </EnumerationList>
      </EnumeratedArgumentType>
    </ArgumentTypeSet>
    <MetaCommandSet>
      <MetaCommand name="Command" abstract="true">
        <ArgumentList>
          <Argument name="opcode" argumentTypeRef="OpCodeType"/>
        </ArgumentList>
        <CommandContainer name="CommandHeader">
          <EntryList>
            <FixedValueEntry binaryValue="1ACF" sizeInBits="16"/>
            <ArgumentRefEntry argumentRef="opcode"/>
          </EntryList>
        </CommandContainer>
      </MetaCommand>
      <MetaCommand name="SetMode">
        <BaseMetaCommand metaCommandRef="Command"/>
        <ArgumentList>
          <Argument name="mode" argumentTypeRef="TargetModeType"/>
        </ArgumentList>
        <CommandContainer name="SetModeContainer">
          <EntryList>
            <ArgumentRefEntry argumentRef="mode"/>
          </EntryList>
          <BaseContainer containerRef="CommandHeader"/>
        </CommandContainer>
      </MetaCommand>
    </MetaCommandSet>
  </CommandMetaData>
</SpaceSystem>
"#;

#[test]
fn test_command_encode_and_decode() {
    let schema = Schema::build(load_str(COMMAND_XML).unwrap()).unwrap();

    // Arguments accumulate across the base chain
    let mut arguments = ValueMap::new();
    arguments.set("opcode", Value::Unsigned(3));
    arguments.set("mode", Value::String("NOMINAL".into()));
    let bytes = encode_command(&schema, "SetMode", &arguments).unwrap();
    assert_eq!(bytes, vec![0x1A, 0xCF, 0x03, 0x02]);

    let decoded = decode_command(&schema, "SetMode", &bytes).unwrap();
    assert_eq!(
        decoded.values.get("opcode").unwrap().engineering,
        Value::Unsigned(3)
    );
    assert_eq!(
        decoded.values.get("mode").unwrap().engineering,
        Value::String("NOMINAL".into())
    );
}

#[test]
fn test_command_missing_argument() {
    let schema = Schema::build(load_str(COMMAND_XML).unwrap()).unwrap();

    let mut arguments = ValueMap::new();
    arguments.set("mode", Value::String("SAFE".into()));
    assert!(encode_command(&schema, "SetMode", &arguments).is_err());
}

#[test]
fn test_command_unknown_label() {
    let schema = Schema::build(load_str(COMMAND_XML).unwrap()).unwrap();

    let mut arguments = ValueMap::new();
    arguments.set("opcode", Value::Unsigned(3));
    arguments.set("mode", Value::String("TURBO".into()));
    assert!(encode_command(&schema, "SetMode", &arguments).is_err());
}

fn u8_type(name: &str) -> TypeDecl {
    TypeDecl {
        name: name.into(),
        unit: None,
        kind: ParameterType::Integer {
            encoding: IntegerEncoding {
                size_in_bits: 8,
                signedness: Signedness::Unsigned,
            },
            calibrator: None,
            valid_range: None,
        },
    }
}

fn parameter(name: &str, type_ref: &str) -> ParameterDecl {
    ParameterDecl {
        name: name.into(),
        type_ref: type_ref.into(),
    }
}

/// Explicit bit locations override the cursor and can read the same
/// bits twice; encode rebuilds the identical layout.
#[test]
fn test_location_in_container_in_bits() {
    let mut system = SpaceSystem::new("Sat");
    system.parameter_types.push(u8_type("U8"));
    for name in ["a", "b", "c", "d"] {
        system.parameters.push(parameter(name, "U8"));
    }
    system.containers.push(ContainerDecl {
        name: "P".into(),
        is_abstract: false,
        base_ref: None,
        restriction: Vec::new(),
        entries: vec![
            EntryDecl::Parameter {
                parameter_ref: "a".into(),
                location: None,
            },
            // Skips the second byte entirely
            EntryDecl::Parameter {
                parameter_ref: "b".into(),
                location: Some(EntryLocation {
                    reference: LocationReference::ContainerStart,
                    bit_offset: 16,
                }),
            },
            EntryDecl::Parameter {
                parameter_ref: "c".into(),
                location: None,
            },
            // Jumps back over b and c to the skipped byte
            EntryDecl::Parameter {
                parameter_ref: "d".into(),
                location: Some(EntryLocation {
                    reference: LocationReference::PreviousEntry,
                    bit_offset: -24,
                }),
            },
        ],
    });
    let schema = Schema::build(system).unwrap();

    let decoded = decode_packet(&schema, "P", &[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
    let get = |name: &str| decoded.values.get(name).unwrap().engineering.clone();
    assert_eq!(get("/Sat/a"), Value::Unsigned(0xAA));
    assert_eq!(get("/Sat/b"), Value::Unsigned(0xCC));
    assert_eq!(get("/Sat/c"), Value::Unsigned(0xDD));
    assert_eq!(get("/Sat/d"), Value::Unsigned(0xBB));

    let mut values = ValueMap::new();
    values.set("/Sat/a", Value::Unsigned(0xAA));
    values.set("/Sat/b", Value::Unsigned(0xCC));
    values.set("/Sat/c", Value::Unsigned(0xDD));
    values.set("/Sat/d", Value::Unsigned(0xBB));
    let bytes = encode_packet(&schema, "P", &values).unwrap();
    assert_eq!(bytes, vec![0xAA, 0xBB, 0xCC, 0xDD]);
}

/// Arrays with a parameter-referenced dimension.
#[test]
fn test_array_with_dynamic_length() {
    let mut system = SpaceSystem::new("Sat");
    system.parameter_types.push(u8_type("U8"));
    system.parameter_types.push(TypeDecl {
        name: "U16".into(),
        unit: None,
        kind: ParameterType::Integer {
            encoding: IntegerEncoding {
                size_in_bits: 16,
                signedness: Signedness::Unsigned,
            },
            calibrator: None,
            valid_range: None,
        },
    });
    system.parameter_types.push(TypeDecl {
        name: "Samples".into(),
        unit: None,
        kind: ParameterType::Array {
            element_type_ref: "U16".into(),
            dimension: ArrayDimension::Parameter("count".into()),
        },
    });
    system.parameters.push(parameter("count", "U8"));
    system.parameters.push(parameter("samples", "Samples"));
    system.containers.push(ContainerDecl {
        name: "P".into(),
        is_abstract: false,
        base_ref: None,
        restriction: Vec::new(),
        entries: vec![
            EntryDecl::Parameter {
                parameter_ref: "count".into(),
                location: None,
            },
            EntryDecl::Parameter {
                parameter_ref: "samples".into(),
                location: None,
            },
        ],
    });
    let schema = Schema::build(system).unwrap();

    let decoded = decode_packet(&schema, "P", &[0x02, 0x00, 0x01, 0x00, 0x02]).unwrap();
    assert_eq!(
        decoded.values.get("/Sat/samples").unwrap().engineering,
        Value::Array(vec![Value::Unsigned(1), Value::Unsigned(2)])
    );

    // Encode requires the declared length to match
    let mut values = ValueMap::new();
    values.set("/Sat/count", Value::Unsigned(2));
    values.set(
        "/Sat/samples",
        Value::Array(vec![Value::Unsigned(1), Value::Unsigned(2)]),
    );
    assert_eq!(
        encode_packet(&schema, "P", &values).unwrap(),
        vec![0x02, 0x00, 0x01, 0x00, 0x02]
    );

    let mut values = ValueMap::new();
    values.set("/Sat/count", Value::Unsigned(3));
    values.set(
        "/Sat/samples",
        Value::Array(vec![Value::Unsigned(1), Value::Unsigned(2)]),
    );
    assert!(encode_packet(&schema, "P", &values).is_err());
}

/// Container-ref entries with include conditions merge the referenced
/// container's fields only when the condition holds.
#[test]
fn test_include_condition() {
    let mut system = SpaceSystem::new("Sat");
    system.parameter_types.push(u8_type("U8"));
    system.parameters.push(parameter("flags", "U8"));
    system.parameters.push(parameter("extra", "U8"));
    system.parameters.push(parameter("tail", "U8"));
    system.containers.push(ContainerDecl {
        name: "Extra".into(),
        is_abstract: false,
        base_ref: None,
        restriction: Vec::new(),
        entries: vec![EntryDecl::Parameter {
            parameter_ref: "extra".into(),
            location: None,
        }],
    });
    system.containers.push(ContainerDecl {
        name: "P".into(),
        is_abstract: false,
        base_ref: None,
        restriction: Vec::new(),
        entries: vec![
            EntryDecl::Parameter {
                parameter_ref: "flags".into(),
                location: None,
            },
            EntryDecl::Container {
                container_ref: "Extra".into(),
                condition: vec![xtce_codec_core::schema::ComparisonDecl {
                    parameter_ref: "flags".into(),
                    operator: xtce_codec_core::compare::ComparisonOperator::Equal,
                    value: "1".into(),
                    use_calibrated: true,
                }],
            },
            EntryDecl::Parameter {
                parameter_ref: "tail".into(),
                location: None,
            },
        ],
    });
    let schema = Schema::build(system).unwrap();

    // Condition holds: extra byte present
    let decoded = decode_packet(&schema, "P", &[0x01, 0x55, 0x99]).unwrap();
    assert_eq!(
        decoded.values.get("/Sat/extra").unwrap().engineering,
        Value::Unsigned(0x55)
    );
    assert_eq!(
        decoded.values.get("/Sat/tail").unwrap().engineering,
        Value::Unsigned(0x99)
    );

    // Condition fails: the referenced container is skipped
    let decoded = decode_packet(&schema, "P", &[0x00, 0x99]).unwrap();
    assert!(decoded.values.get("/Sat/extra").is_none());
    assert_eq!(
        decoded.values.get("/Sat/tail").unwrap().engineering,
        Value::Unsigned(0x99)
    );
}

/// Engineering-value round trip across every integer width and both
/// signedness forms, driven by a fixed seed.
#[test]
fn test_randomized_integer_round_trips() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    for bits in 1..=64u32 {
        for signedness in [Signedness::Unsigned, Signedness::TwosComplement] {
            let mut system = SpaceSystem::new("Sat");
            system.parameter_types.push(TypeDecl {
                name: "T".into(),
                unit: None,
                kind: ParameterType::Integer {
                    encoding: IntegerEncoding {
                        size_in_bits: bits,
                        signedness,
                    },
                    calibrator: None,
                    valid_range: None,
                },
            });
            system.parameters.push(parameter("x", "T"));
            system.containers.push(ContainerDecl {
                name: "P".into(),
                is_abstract: false,
                base_ref: None,
                restriction: Vec::new(),
                entries: vec![EntryDecl::Parameter {
                    parameter_ref: "x".into(),
                    location: None,
                }],
            });
            let schema = Schema::build(system).unwrap();

            for _ in 0..20 {
                let value = match signedness {
                    Signedness::Unsigned => {
                        let raw: u64 = rng.gen();
                        let masked = if bits == 64 { raw } else { raw & ((1 << bits) - 1) };
                        Value::Unsigned(masked)
                    }
                    Signedness::TwosComplement => {
                        let raw: i64 = rng.gen();
                        let shifted = raw >> (64 - bits);
                        Value::Integer(shifted)
                    }
                };

                let mut values = ValueMap::new();
                values.set("/Sat/x", value.clone());
                let bytes = encode_packet(&schema, "P", &values).unwrap();
                let decoded = decode_packet(&schema, "P", &bytes).unwrap();
                assert_eq!(
                    decoded.values.get("/Sat/x").unwrap().engineering,
                    value,
                    "width {bits} {signedness:?}"
                );
            }
        }
    }
}

/// Calibrated round trip through a cubic: engineering values recovered
/// within float tolerance.
#[test]
fn test_calibrated_round_trip_tolerance() {
    let mut system = SpaceSystem::new("Sat");
    system.parameter_types.push(TypeDecl {
        name: "Cubic".into(),
        unit: None,
        kind: ParameterType::Integer {
            encoding: IntegerEncoding {
                size_in_bits: 16,
                signedness: Signedness::Unsigned,
            },
            calibrator: Some(PolynomialCalibrator::new(&[
                PolynomialTerm {
                    coefficient: 3.0,
                    exponent: 0,
                },
                PolynomialTerm {
                    coefficient: 0.5,
                    exponent: 1,
                },
                PolynomialTerm {
                    coefficient: 0.001,
                    exponent: 3,
                },
            ])),
            valid_range: Some(xtce_codec_core::types::ValidRange {
                min: 0.0,
                max: 65535.0,
                applies_to_calibrated: false,
            }),
        },
    });
    system.parameters.push(parameter("x", "Cubic"));
    system.containers.push(ContainerDecl {
        name: "P".into(),
        is_abstract: false,
        base_ref: None,
        restriction: Vec::new(),
        entries: vec![EntryDecl::Parameter {
            parameter_ref: "x".into(),
            location: None,
        }],
    });
    let schema = Schema::build(system).unwrap();

    let calibrator = PolynomialCalibrator::new(&[
        PolynomialTerm {
            coefficient: 3.0,
            exponent: 0,
        },
        PolynomialTerm {
            coefficient: 0.5,
            exponent: 1,
        },
        PolynomialTerm {
            coefficient: 0.001,
            exponent: 3,
        },
    ]);

    for raw in [0u64, 1, 100, 5000, 65535] {
        let engineering = calibrator.calibrate(raw as f64);
        let mut values = ValueMap::new();
        values.set("/Sat/x", Value::Float(engineering));
        let bytes = encode_packet(&schema, "P", &values).unwrap();

        let decoded = decode_packet(&schema, "P", &bytes).unwrap();
        let pv = decoded.values.get("/Sat/x").unwrap();
        assert_eq!(pv.raw, Value::Unsigned(raw), "raw {raw}");
        match pv.engineering {
            Value::Float(v) => assert!(
                (v - engineering).abs() < 1e-6,
                "raw {raw}: {v} vs {engineering}"
            ),
            ref other => panic!("expected float, got {other:?}"),
        }
    }
}

/// Nested space systems resolve references upward and qualify decoded
/// names with their full path.
#[test]
fn test_nested_space_systems() {
    let xml = r#"
        <SpaceSystem name="Fleet">
          <TelemetryMetaData>
            <ParameterTypeSet>
              <IntegerParameterType name="U8">
                <IntegerDataEncoding sizeInBits="8"/>
              </IntegerParameterType>
            </ParameterTypeSet>
          </TelemetryMetaData>
          <SpaceSystem name="SatA">
            <TelemetryMetaData>
              <ParameterSet>
                <Parameter name="status" parameterTypeRef="U8"/>
              </ParameterSet>
              <ContainerSet>
                <SequenceContainer name="StatusPacket">
                  <EntryList>
                    <ParameterRefEntry parameterRef="status"/>
                  </EntryList>
                </SequenceContainer>
              </ContainerSet>
            </TelemetryMetaData>
          </SpaceSystem>
        </SpaceSystem>
    "#;
    let schema = Schema::build(load_str(xml).unwrap()).unwrap();

    let decoded = decode_packet(&schema, "/Fleet/SatA/StatusPacket", &[0x07]).unwrap();
    assert_eq!(
        decoded.values.get("/Fleet/SatA/status").unwrap().engineering,
        Value::Unsigned(7)
    );
}

/// MetaCommands assembled in code: base chain plus container chain.
#[test]
fn test_command_built_in_code() {
    let mut system = SpaceSystem::new("Sat");
    system.argument_types.push(u8_type("U8Arg"));
    system.meta_commands.push(MetaCommandDecl {
        name: "Ping".into(),
        is_abstract: false,
        base_ref: None,
        arguments: vec![ArgumentDecl {
            name: "seq".into(),
            type_ref: "U8Arg".into(),
        }],
        container: Some(ContainerDecl {
            name: "PingContainer".into(),
            is_abstract: false,
            base_ref: None,
            restriction: Vec::new(),
            entries: vec![EntryDecl::Argument {
                argument_ref: "seq".into(),
            }],
        }),
    });
    let schema = Schema::build(system).unwrap();

    let mut arguments = ValueMap::new();
    arguments.set("seq", Value::Unsigned(9));
    let bytes = encode_command(&schema, "Ping", &arguments).unwrap();
    assert_eq!(bytes, vec![0x09]);

    let decoded = decode_command(&schema, "Ping", &bytes).unwrap();
    assert_eq!(
        decoded.values.get("seq").unwrap().engineering,
        Value::Unsigned(9)
    );
}
