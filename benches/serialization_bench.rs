//! Serialization performance benchmarks

use bamlc::serializer::{BrushSerializer, CustomBinarySerializer, PathGeometrySerializer};
use bamlc::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn event(name: &str) -> MarkupEvent {
    MarkupEvent::StartElement {
        namespace_uri: PRESENTATION_NAMESPACE.to_string(),
        name: name.to_string(),
        position: SourcePosition::default(),
    }
}

fn attr(name: &str, value: &str) -> MarkupEvent {
    MarkupEvent::Attribute {
        namespace_uri: PRESENTATION_NAMESPACE.to_string(),
        name: name.to_string(),
        value: value.to_string(),
        position: SourcePosition::default(),
    }
}

fn end() -> MarkupEvent {
    MarkupEvent::EndElement {
        position: SourcePosition::default(),
    }
}

fn large_document(items: usize) -> Vec<MarkupEvent> {
    let mut events = vec![event("Window"), event("StackPanel")];
    for i in 0..items {
        events.push(event("Button"));
        events.push(attr("Width", "120"));
        events.push(attr("Background", if i % 2 == 0 { "Red" } else { "#FF336699" }));
        events.push(attr("Style", "{StaticResource ItemStyle}"));
        events.push(attr("Content", "{Binding Path=Name, Mode=OneWay}"));
        events.push(end());
    }
    events.push(end());
    events.push(end());
    events
}

fn bench_varint(c: &mut Criterion) {
    c.bench_function("varint_round_trip", |b| {
        b.iter(|| {
            for value in [0u32, 127, 128, 16_383, 16_384, u32::MAX] {
                let bytes = varint::encode_to_vec(black_box(value));
                black_box(varint::decode_from_slice(&bytes).unwrap());
            }
        })
    });
}

fn bench_serializers(c: &mut Criterion) {
    c.bench_function("brush_known_color", |b| {
        let serializer = BrushSerializer::new();
        b.iter(|| {
            let mut out = Vec::with_capacity(8);
            serializer
                .convert_string_to_custom_binary(&mut out, black_box("CornflowerBlue"))
                .unwrap();
            out
        })
    });

    c.bench_function("path_geometry", |b| {
        let serializer = PathGeometrySerializer::new();
        let data = "M 10,100 C 10,300 300,-200 300,100 L 400,100 A 50,50 0 1 1 500,100 Z";
        b.iter(|| {
            let mut out = Vec::with_capacity(128);
            serializer.convert_string_to_custom_binary(&mut out, black_box(data)).unwrap();
            out
        })
    });
}

fn bench_large_document(c: &mut Criterion) {
    let events = large_document(1000);

    c.bench_function("compile_large_document", |b| {
        b.iter(|| compile_events(black_box(&events)).unwrap())
    });

    let bytes = compile_events(&events).unwrap();
    c.bench_function("read_large_document", |b| {
        b.iter(|| read_document(black_box(&bytes)).unwrap())
    });
}

criterion_group!(benches, bench_varint, bench_serializers, bench_large_document);
criterion_main!(benches);
